//! Subject canonicalization.
//!
//! After authentication, the subject's principals are reduced to a single
//! canonical principal name. Each strategy is wrapped in a
//! [`SubjectCanonicalizationFlowDescriptor`] and chosen with the same
//! [`FlowSelector`] used for authentication flows.
//!
//! # Example
//!
//! ```ignore
//! let engine = SubjectCanonicalizationEngine::new(vec![
//!     SubjectCanonicalizationFlowDescriptor::new("c14n/SAML2Persistent", Arc::new(name_id)),
//!     SubjectCanonicalizationFlowDescriptor::new("c14n/simple", Arc::new(SimpleSubjectCanonicalization::new())),
//! ])?;
//!
//! let mut ctx = SubjectCanonicalizationContext::new(subject).requester("https://sp.example.org");
//! if engine.canonicalize(&mut ctx).is_proceed() {
//!     println!("{:?}", ctx.principal_name);
//! }
//! ```

mod name_id;
mod simple;
mod transform;
mod x500;

pub use name_id::{ClosureNameIdDecoder, DirectNameIdDecoder, NameIdCanonicalization, NameIdDecoder};
pub use simple::SimpleSubjectCanonicalization;
pub use transform::PrincipalNameTransforms;
pub use x500::X500SubjectCanonicalization;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::idp::authn::audit::{AuditEvent, AuditEventType, AuditLogger};
use crate::idp::authn::flow::{FlowDescriptor, FlowSelectionContext, FlowSelectionState, FlowSelector};
use crate::idp::authn::principal::Subject;
use crate::idp::error::{C14nError, ConfigError, Event, FlowRejection};

/// Per-request canonicalization state.
#[derive(Debug, Default)]
pub struct SubjectCanonicalizationContext {
    pub subject: Option<Subject>,
    pub requester_id: Option<String>,
    pub responder_id: Option<String>,
    pub principal_name: Option<String>,
    /// Why the last strategy failed.
    pub exception: Option<C14nError>,
    pub flow_selection: FlowSelectionState<SubjectCanonicalizationFlowDescriptor>,
}

impl SubjectCanonicalizationContext {
    pub fn new(subject: Subject) -> Self {
        Self {
            subject: Some(subject),
            ..Default::default()
        }
    }

    pub fn requester(mut self, id: impl Into<String>) -> Self {
        self.requester_id = Some(id.into());
        self
    }

    pub fn responder(mut self, id: impl Into<String>) -> Self {
        self.responder_id = Some(id.into());
        self
    }

    /// Record a failure and hand back the event to signal.
    pub(crate) fn fail(&mut self, event: Event, error: C14nError) -> Event {
        info!("Subject canonicalization failed: {}", error);
        self.exception = Some(error);
        event
    }
}

impl FlowSelectionContext for SubjectCanonicalizationContext {
    type Descriptor = SubjectCanonicalizationFlowDescriptor;

    fn selection(&self) -> &FlowSelectionState<SubjectCanonicalizationFlowDescriptor> {
        &self.flow_selection
    }

    fn selection_mut(&mut self) -> &mut FlowSelectionState<SubjectCanonicalizationFlowDescriptor> {
        &mut self.flow_selection
    }
}

/// A canonicalization strategy.
pub trait SubjectCanonicalizer: Send + Sync {
    /// Default activation condition of the strategy.
    fn is_applicable(&self, context: &SubjectCanonicalizationContext) -> Result<(), FlowRejection>;

    /// Set `context.principal_name` and signal `Proceed`, or record an
    /// exception and signal a failure event.
    fn canonicalize(&self, context: &mut SubjectCanonicalizationContext) -> Result<Event, C14nError>;
}

type ActivationFn = dyn Fn(&SubjectCanonicalizationContext) -> Result<(), FlowRejection> + Send + Sync;

/// A canonicalization flow.
#[derive(Clone)]
pub struct SubjectCanonicalizationFlowDescriptor {
    id: String,
    canonicalizer: Arc<dyn SubjectCanonicalizer>,
    activation_condition: Option<Arc<ActivationFn>>,
}

impl SubjectCanonicalizationFlowDescriptor {
    pub fn new(id: impl Into<String>, canonicalizer: Arc<dyn SubjectCanonicalizer>) -> Self {
        Self {
            id: id.into(),
            canonicalizer,
            activation_condition: None,
        }
    }

    /// Replace the strategy's own activation condition.
    pub fn activation_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&SubjectCanonicalizationContext) -> Result<(), FlowRejection> + Send + Sync + 'static,
    {
        self.activation_condition = Some(Arc::new(condition));
        self
    }

    pub fn canonicalizer(&self) -> &Arc<dyn SubjectCanonicalizer> {
        &self.canonicalizer
    }
}

impl FlowDescriptor for SubjectCanonicalizationFlowDescriptor {
    type Context = SubjectCanonicalizationContext;

    fn id(&self) -> &str {
        &self.id
    }

    fn check_applicable(&self, context: &SubjectCanonicalizationContext) -> Result<(), FlowRejection> {
        match &self.activation_condition {
            Some(condition) => condition(context),
            None => self.canonicalizer.is_applicable(context),
        }
    }
}

impl fmt::Debug for SubjectCanonicalizationFlowDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubjectCanonicalizationFlowDescriptor")
            .field("id", &self.id)
            .field("custom_activation", &self.activation_condition.is_some())
            .finish()
    }
}

/// Picks the canonicalization flow for a subject.
#[derive(Debug, Clone)]
pub struct SelectSubjectCanonicalizationFlow {
    selector: FlowSelector,
}

impl Default for SelectSubjectCanonicalizationFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectSubjectCanonicalizationFlow {
    pub fn new() -> Self {
        Self {
            selector: FlowSelector::new("SelectSubjectCanonicalizationFlow"),
        }
    }

    pub fn execute(&self, context: &mut SubjectCanonicalizationContext) -> Event {
        self.selector.select(context)
    }
}

/// Runs canonicalization flows until one produces a principal name.
#[derive(Debug)]
pub struct SubjectCanonicalizationEngine {
    flows: FlowSelectionState<SubjectCanonicalizationFlowDescriptor>,
    select: SelectSubjectCanonicalizationFlow,
    audit_logger: Option<Arc<AuditLogger>>,
}

impl SubjectCanonicalizationEngine {
    /// Build an engine over the given flows, tried in order.
    pub fn new(
        flows: impl IntoIterator<Item = SubjectCanonicalizationFlowDescriptor>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            flows: FlowSelectionState::with_flows(flows.into_iter().map(Arc::new))?,
            select: SelectSubjectCanonicalizationFlow::new(),
            audit_logger: None,
        })
    }

    pub fn audit_logger(mut self, logger: Arc<AuditLogger>) -> Self {
        self.audit_logger = Some(logger);
        self
    }

    /// Canonicalize the context's subject.
    ///
    /// A strategy that fails sends selection round again; when no flow is
    /// left, the last failure event is returned, or `NoPotentialFlow` if no
    /// strategy ever ran.
    pub fn canonicalize(&self, context: &mut SubjectCanonicalizationContext) -> Event {
        if context.flow_selection.potential_flows().is_empty() {
            context.flow_selection = self.flows.clone();
        }

        let mut last_failure = None;
        loop {
            if let Event::NoPotentialFlow = self.select.execute(context) {
                return last_failure.unwrap_or(Event::NoPotentialFlow);
            }
            let Some(flow) = context.flow_selection.attempted_flow().cloned() else {
                return Event::NoPotentialFlow;
            };

            let event = match flow.canonicalizer().canonicalize(context) {
                Ok(event) => event,
                Err(error) => context.fail(Event::SubjectC14nError, error),
            };

            if event.is_proceed() {
                debug!("Canonicalization flow {} succeeded", flow.id());
                if let Some(logger) = &self.audit_logger {
                    let mut audit = AuditEvent::new(AuditEventType::SubjectCanonicalized)
                        .flow_id(flow.id());
                    if let Some(name) = &context.principal_name {
                        audit = audit.username(name.clone());
                    }
                    logger.log(audit);
                }
                return event;
            }
            debug!("Canonicalization flow {} signaled {}", flow.id(), event);
            last_failure = Some(event);
        }
    }
}
