//! Drives a full authentication attempt.
//!
//! Selects an authentication flow, runs its [`ValidateCredentials`] action and,
//! on success, canonicalizes the resulting subject.
//!
//! [`ValidateCredentials`]: crate::idp::authn::validate::ValidateCredentials

use std::sync::Arc;

use tracing::{debug, info};

use crate::idp::authn::c14n::{SubjectCanonicalizationContext, SubjectCanonicalizationEngine};
use crate::idp::authn::context::AuthenticationContext;
use crate::idp::authn::flow::{FlowDescriptor, FlowSelectionState};
use crate::idp::authn::select::{AuthenticationFlowDescriptor, SelectAuthenticationFlow};
use crate::idp::error::{ConfigError, Event};

/// Authentication flows plus the canonicalization that follows them.
#[derive(Debug, Default)]
pub struct AuthenticationEngine {
    flows: FlowSelectionState<AuthenticationFlowDescriptor>,
    select: SelectAuthenticationFlow,
    c14n: Option<SubjectCanonicalizationEngine>,
}

impl AuthenticationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a flow. Flows are tried in the order they are added.
    pub fn authentication_flow(mut self, flow: AuthenticationFlowDescriptor) -> Result<Self, ConfigError> {
        self.flows.add_potential_flow(Arc::new(flow))?;
        Ok(self)
    }

    pub fn subject_canonicalization(mut self, engine: SubjectCanonicalizationEngine) -> Self {
        self.c14n = Some(engine);
        self
    }

    /// Authenticate the request described by `context`.
    ///
    /// A flow whose action signals `RequestUnsupported` is retired and the
    /// next applicable flow is tried. Any other event ends the attempt.
    /// Credentials are dropped from the context once no flow is left.
    pub async fn authenticate(&self, context: &mut AuthenticationContext) -> Event {
        if context.flow_selection.potential_flows().is_empty() {
            context.flow_selection = self.flows.clone();
        }

        let event = loop {
            if let event @ Event::NoPotentialFlow = self.select.execute(context) {
                info!("Authentication failed, no applicable flow");
                context.clear_credentials();
                return event;
            }
            let Some(flow) = context.flow_selection.attempted_flow().cloned() else {
                context.clear_credentials();
                return Event::NoPotentialFlow;
            };

            let event = flow.action().execute(context).await;
            if event == Event::RequestUnsupported {
                debug!("Flow {} could not handle the request, reselecting", flow.id());
                continue;
            }
            break event;
        };

        let Some(result) = &context.authentication_result else {
            return event;
        };
        let Some(c14n) = &self.c14n else {
            return event;
        };

        let mut c14n_context = SubjectCanonicalizationContext::new(result.subject().clone());
        c14n_context.requester_id = context.requester_id.clone();
        c14n_context.responder_id = context.responder_id.clone();

        let c14n_event = c14n.canonicalize(&mut c14n_context);
        if !c14n_event.is_proceed() {
            info!("Subject canonicalization failed: {}", c14n_event);
            return c14n_event;
        }
        context.principal_name = c14n_context.principal_name;
        event
    }
}
