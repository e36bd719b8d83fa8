//! Generic flow selection.
//!
//! Authentication flows and subject canonicalization flows are chosen by the
//! same state machine. A context type exposes a [`FlowSelectionState`] holding
//! its ordered candidate flows, and [`FlowSelector`] walks them:
//!
//! 1. At the start of each round, a flow attempted in an earlier round is moved
//!    into the intermediate set and never tried again in this attempt.
//! 2. Candidates are tested in insertion order, skipping intermediate ones.
//!    The first applicable flow is signaled as [`Event::Flow`] with its id.
//! 3. A candidate that is not applicable is only skipped for this round. It is
//!    not added to the intermediate set, so it can be selected in a later round
//!    once earlier steps have changed the context.
//! 4. When nothing applies, [`Event::NoPotentialFlow`] is signaled.
//!
//! # Example
//!
//! ```ignore
//! let selector = FlowSelector::new("authn");
//! match selector.select(&mut ctx) {
//!     Event::Flow(id) => run_flow(&id),
//!     other => return other,
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::idp::error::{ConfigError, Event, FlowRejection};

/// A candidate flow for some context type.
pub trait FlowDescriptor: Send + Sync {
    /// The context the applicability test inspects.
    type Context;

    /// Unique id, also used as the dispatch event.
    fn id(&self) -> &str;

    /// Decide whether this flow can handle the request.
    fn check_applicable(&self, context: &Self::Context) -> Result<(), FlowRejection>;
}

/// Per-attempt selection state.
#[derive(Debug)]
pub struct FlowSelectionState<D> {
    potential_flows: Vec<Arc<D>>,
    intermediate_flows: HashSet<String>,
    attempted_flow: Option<Arc<D>>,
    exception: Option<FlowRejection>,
}

impl<D> Default for FlowSelectionState<D> {
    fn default() -> Self {
        Self {
            potential_flows: Vec::new(),
            intermediate_flows: HashSet::new(),
            attempted_flow: None,
            exception: None,
        }
    }
}

impl<D> Clone for FlowSelectionState<D> {
    fn clone(&self) -> Self {
        Self {
            potential_flows: self.potential_flows.clone(),
            intermediate_flows: self.intermediate_flows.clone(),
            attempted_flow: self.attempted_flow.clone(),
            exception: self.exception.clone(),
        }
    }
}

impl<D: FlowDescriptor> FlowSelectionState<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from an ordered list of candidates.
    pub fn with_flows(flows: impl IntoIterator<Item = Arc<D>>) -> Result<Self, ConfigError> {
        let mut state = Self::new();
        for flow in flows {
            state.add_potential_flow(flow)?;
        }
        Ok(state)
    }

    /// Append a candidate. Ids must be unique.
    pub fn add_potential_flow(&mut self, flow: Arc<D>) -> Result<(), ConfigError> {
        if self.potential_flows.iter().any(|f| f.id() == flow.id()) {
            return Err(ConfigError::DuplicateFlow {
                id: flow.id().to_string(),
            });
        }
        self.potential_flows.push(flow);
        Ok(())
    }

    pub fn potential_flows(&self) -> &[Arc<D>] {
        &self.potential_flows
    }

    pub fn potential_flow(&self, id: &str) -> Option<&Arc<D>> {
        self.potential_flows.iter().find(|f| f.id() == id)
    }

    pub fn intermediate_flows(&self) -> &HashSet<String> {
        &self.intermediate_flows
    }

    /// Exclude a flow from the rest of this attempt.
    pub fn add_intermediate_flow(&mut self, id: impl Into<String>) {
        self.intermediate_flows.insert(id.into());
    }

    pub fn attempted_flow(&self) -> Option<&Arc<D>> {
        self.attempted_flow.as_ref()
    }

    pub fn set_attempted_flow(&mut self, flow: Option<Arc<D>>) {
        self.attempted_flow = flow;
    }

    /// Reason the last tested flow was rejected, while it is being reported.
    pub fn exception(&self) -> Option<&FlowRejection> {
        self.exception.as_ref()
    }

    pub fn set_exception(&mut self, exception: Option<FlowRejection>) {
        self.exception = exception;
    }
}

/// A context that carries flow selection state.
pub trait FlowSelectionContext: Sized {
    type Descriptor: FlowDescriptor<Context = Self>;

    fn selection(&self) -> &FlowSelectionState<Self::Descriptor>;

    fn selection_mut(&mut self) -> &mut FlowSelectionState<Self::Descriptor>;

    /// Called once a flow has been chosen, before the dispatch event is returned.
    fn flow_selected(&mut self, _flow: &Arc<Self::Descriptor>) {}
}

/// The selection state machine, shared by every flow type.
#[derive(Debug, Clone)]
pub struct FlowSelector {
    log_prefix: String,
}

impl Default for FlowSelector {
    fn default() -> Self {
        Self::new("flow")
    }
}

impl FlowSelector {
    /// Create a selector. The label prefixes log messages.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            log_prefix: label.into(),
        }
    }

    /// Run one selection round.
    pub fn select<C: FlowSelectionContext>(&self, context: &mut C) -> Event {
        self.pre_execute(context);
        self.execute(context)
    }

    /// Retire the flow attempted in the previous round.
    pub fn pre_execute<C: FlowSelectionContext>(&self, context: &mut C) {
        let state = context.selection_mut();
        if let Some(previous) = state.attempted_flow.take() {
            debug!(
                "{}: moving incomplete flow {} to intermediate set",
                self.log_prefix,
                previous.id()
            );
            state.intermediate_flows.insert(previous.id().to_string());
        }
    }

    /// Pick the first applicable candidate not yet retired.
    pub fn execute<C: FlowSelectionContext>(&self, context: &mut C) -> Event {
        match self.select_unattempted_flow(context) {
            Some(flow) => {
                debug!("{}: selecting flow {}", self.log_prefix, flow.id());
                context.flow_selected(&flow);
                Event::Flow(flow.id().to_string())
            }
            None => {
                debug!(
                    "{}: no potential flows left to choose from, selection failed",
                    self.log_prefix
                );
                Event::NoPotentialFlow
            }
        }
    }

    fn select_unattempted_flow<C: FlowSelectionContext>(
        &self,
        context: &mut C,
    ) -> Option<Arc<C::Descriptor>> {
        let candidates: Vec<Arc<C::Descriptor>> = context
            .selection()
            .potential_flows
            .iter()
            .filter(|f| !context.selection().intermediate_flows.contains(f.id()))
            .cloned()
            .collect();

        for flow in candidates {
            debug!(
                "{}: checking flow {} for applicability",
                self.log_prefix,
                flow.id()
            );
            context.selection_mut().attempted_flow = Some(Arc::clone(&flow));

            match flow.check_applicable(context) {
                Ok(()) => return Some(flow),
                Err(rejection) => {
                    let state = context.selection_mut();
                    state.exception = Some(rejection);
                    if let Some(reason) = state.exception.take() {
                        debug!(
                            "{}: flow {} was not applicable: {}",
                            self.log_prefix,
                            flow.id(),
                            reason
                        );
                    }
                    // Left out of the intermediate set on purpose: a later round
                    // may find it applicable.
                }
            }
        }

        None
    }
}
