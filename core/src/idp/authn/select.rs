//! Authentication flow selection.

use std::fmt;
use std::sync::Arc;

use crate::idp::authn::context::AuthenticationContext;
use crate::idp::authn::flow::{FlowDescriptor, FlowSelector};
use crate::idp::authn::principal::Principal;
use crate::idp::authn::validate::ValidateCredentials;
use crate::idp::error::{Event, FlowRejection};

type ActivationFn = dyn Fn(&AuthenticationContext) -> Result<(), FlowRejection> + Send + Sync;

/// An authentication flow and the action that runs it.
#[derive(Clone)]
pub struct AuthenticationFlowDescriptor {
    id: String,
    supported_principals: Vec<Principal>,
    passive_authentication_supported: bool,
    forced_authentication_supported: bool,
    activation_condition: Option<Arc<ActivationFn>>,
    action: Arc<ValidateCredentials>,
}

impl AuthenticationFlowDescriptor {
    pub fn new(id: impl Into<String>, action: Arc<ValidateCredentials>) -> Self {
        Self {
            id: id.into(),
            supported_principals: Vec::new(),
            passive_authentication_supported: false,
            forced_authentication_supported: true,
            activation_condition: None,
            action,
        }
    }

    /// Principals this flow can satisfy when a relying party requests them.
    pub fn supported_principal(mut self, principal: Principal) -> Self {
        self.supported_principals.push(principal);
        self
    }

    pub fn passive_authentication_supported(mut self, supported: bool) -> Self {
        self.passive_authentication_supported = supported;
        self
    }

    pub fn forced_authentication_supported(mut self, supported: bool) -> Self {
        self.forced_authentication_supported = supported;
        self
    }

    /// Extra applicability test run after the built-in checks.
    pub fn activation_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&AuthenticationContext) -> Result<(), FlowRejection> + Send + Sync + 'static,
    {
        self.activation_condition = Some(Arc::new(condition));
        self
    }

    pub fn supported_principals(&self) -> &[Principal] {
        &self.supported_principals
    }

    pub fn action(&self) -> &Arc<ValidateCredentials> {
        &self.action
    }
}

impl FlowDescriptor for AuthenticationFlowDescriptor {
    type Context = AuthenticationContext;

    fn id(&self) -> &str {
        &self.id
    }

    fn check_applicable(&self, context: &AuthenticationContext) -> Result<(), FlowRejection> {
        if context.is_passive && !self.passive_authentication_supported {
            return Err(FlowRejection::new(format!(
                "flow {} does not support passive authentication",
                self.id
            )));
        }
        if context.force_authn && !self.forced_authentication_supported {
            return Err(FlowRejection::new(format!(
                "flow {} does not support forced authentication",
                self.id
            )));
        }
        if let Some(condition) = &self.activation_condition {
            condition(context)?;
        }
        if let Some(rpc) = &context.requested_principal {
            if !rpc.requested.is_empty() && rpc.find_match(&self.supported_principals).is_none() {
                return Err(FlowRejection::new(format!(
                    "flow {} supports none of the requested principals",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for AuthenticationFlowDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationFlowDescriptor")
            .field("id", &self.id)
            .field("supported_principals", &self.supported_principals)
            .field("passive", &self.passive_authentication_supported)
            .field("forced", &self.forced_authentication_supported)
            .finish()
    }
}

/// Picks the authentication flow for a request.
#[derive(Debug, Clone)]
pub struct SelectAuthenticationFlow {
    selector: FlowSelector,
}

impl Default for SelectAuthenticationFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectAuthenticationFlow {
    pub fn new() -> Self {
        Self {
            selector: FlowSelector::new("SelectAuthenticationFlow"),
        }
    }

    /// Run one selection round; signals the chosen flow id or `NoPotentialFlow`.
    pub fn execute(&self, context: &mut AuthenticationContext) -> Event {
        self.selector.select(context)
    }
}
