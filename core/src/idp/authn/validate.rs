//! Credential validation orchestrator.
//!
//! [`ValidateCredentials`] runs an ordered list of validators and reduces their
//! outcomes to a single event:
//!
//! - A locked account stops the attempt before any validator runs.
//! - Validators run in order. One that declines is skipped without a trace.
//! - Without `require_all`, the first success wins. With it, every validator
//!   that does not decline must succeed and the first failure stops the loop.
//! - Only the first failure event is surfaced, and the lockout counter is
//!   incremented at most once per attempt.
//! - On success the lockout state is cleared before the success bookkeeping
//!   runs, and the subjects of all successful validators are merged.
//!
//! # Example
//!
//! ```ignore
//! let action = ValidateCredentials::new(vec![jaas, ldap])
//!     .lockout_manager(Arc::new(lockout))
//!     .audit_logger(Arc::new(AuditLogger::with_tracing()));
//!
//! match action.execute(&mut ctx).await {
//!     Event::Proceed => { /* ctx.authentication_result is set */ }
//!     other => return other,
//! }
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::idp::authn::audit::{AuditEvent, AuditEventType, AuditLogger};
use crate::idp::authn::classifier::MessageClassifier;
use crate::idp::authn::context::{AuthenticationContext, AuthenticationResult};
use crate::idp::authn::flow::FlowDescriptor;
use crate::idp::authn::lockout::AccountLockoutManager;
use crate::idp::authn::principal::Subject;
use crate::idp::authn::validator::{CredentialValidator, Warnings};
use crate::idp::error::{CredentialError, Event};

type SuccessHook = dyn Fn(&AuthenticationContext) + Send + Sync;

const LOG_PREFIX: &str = "ValidateCredentials";

/// Runs credential validators under an all-or-first-success policy.
pub struct ValidateCredentials {
    validators: Vec<Arc<dyn CredentialValidator>>,
    require_all: bool,
    lockout_manager: Option<Arc<dyn AccountLockoutManager>>,
    error_classifier: MessageClassifier,
    warning_classifier: MessageClassifier,
    audit_logger: Option<Arc<AuditLogger>>,
    metric_prefix: String,
    default_flow_id: String,
    cleanup_credentials: bool,
    success_hook: Option<Arc<SuccessHook>>,
}

impl ValidateCredentials {
    pub fn new(validators: Vec<Arc<dyn CredentialValidator>>) -> Self {
        Self {
            validators,
            require_all: false,
            lockout_manager: None,
            error_classifier: MessageClassifier::default_errors(),
            warning_classifier: MessageClassifier::default_warnings(),
            audit_logger: None,
            metric_prefix: "idp.authn.validate".to_string(),
            default_flow_id: "authn/Password".to_string(),
            cleanup_credentials: true,
            success_hook: None,
        }
    }

    /// Require every non-declining validator to succeed.
    pub fn require_all(mut self, require_all: bool) -> Self {
        self.require_all = require_all;
        self
    }

    pub fn lockout_manager(mut self, manager: Arc<dyn AccountLockoutManager>) -> Self {
        self.lockout_manager = Some(manager);
        self
    }

    pub fn error_classifier(mut self, classifier: MessageClassifier) -> Self {
        self.error_classifier = classifier;
        self
    }

    pub fn warning_classifier(mut self, classifier: MessageClassifier) -> Self {
        self.warning_classifier = classifier;
        self
    }

    pub fn audit_logger(mut self, logger: Arc<AuditLogger>) -> Self {
        self.audit_logger = Some(logger);
        self
    }

    pub fn metric_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.metric_prefix = prefix.into();
        self
    }

    /// Flow id recorded on results produced outside flow selection.
    pub fn default_flow_id(mut self, id: impl Into<String>) -> Self {
        self.default_flow_id = id.into();
        self
    }

    /// Whether to drop credential material once the attempt is decided.
    pub fn cleanup_credentials(mut self, cleanup: bool) -> Self {
        self.cleanup_credentials = cleanup;
        self
    }

    /// Bookkeeping run after a successful attempt, once lockout has been cleared.
    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AuthenticationContext) + Send + Sync + 'static,
    {
        self.success_hook = Some(Arc::new(hook));
        self
    }

    pub fn validators(&self) -> &[Arc<dyn CredentialValidator>] {
        &self.validators
    }

    pub fn is_require_all(&self) -> bool {
        self.require_all
    }

    /// Validate the credentials in `context`.
    pub async fn execute(&self, context: &mut AuthenticationContext) -> Event {
        if let Some(manager) = &self.lockout_manager {
            if manager.check(context).await {
                info!(
                    "{}: account {:?} is locked out, aborting authentication",
                    LOG_PREFIX,
                    manager.account_key(context)
                );
                context
                    .errors
                    .classified_errors
                    .push(Event::AccountLocked.id().to_string());
                self.audit(self.base_event(context, AuditEventType::AccountLocked));
                self.cleanup(context);
                return Event::AccountLocked;
            }
        }

        let mut results: Vec<Subject> = Vec::new();
        let mut signaled: Option<Event> = None;
        let mut warning_event: Option<Event> = None;

        for validator in &self.validators {
            let metric = format!("{}.{}", self.metric_prefix, validator.id());
            debug!("{}: attempting credential validation with {}", LOG_PREFIX, validator.id());

            let mut warnings = Warnings::new();
            let outcome = validator.validate(context, &mut warnings).await;
            if let Some(event) = self.record_warnings(context, &mut warnings) {
                warning_event = Some(event);
            }

            match outcome {
                Ok(None) => {
                    debug!("{}: validator {} did not apply", LOG_PREFIX, validator.id());
                }
                Ok(Some(subject)) => {
                    debug!("{}: validator {} succeeded", LOG_PREFIX, validator.id());
                    self.record_attempt(context, validator.id(), &metric, "success", None);
                    results.push(subject);
                    if !self.require_all {
                        return self.succeed(context, results, warning_event).await;
                    }
                }
                Err(error) => {
                    info!(
                        "{}: validator {} failed: {}",
                        LOG_PREFIX,
                        validator.id(),
                        error
                    );
                    self.record_attempt(
                        context,
                        validator.id(),
                        &metric,
                        "failure",
                        Some(&error),
                    );
                    if self.require_all || signaled.is_none() {
                        let event = self.record_error(context, error, Some(Event::AuthnException));
                        signaled.get_or_insert(event);
                    }
                    if self.require_all {
                        break;
                    }
                }
            }
        }

        if self.require_all && signaled.is_none() && !results.is_empty() {
            return self.succeed(context, results, warning_event).await;
        }

        match signaled {
            Some(event) => {
                if let Some(manager) = &self.lockout_manager {
                    if manager.increment(context).await {
                        self.audit_lockout(
                            context,
                            manager.as_ref(),
                            AuditEventType::LockoutIncremented,
                        );
                    } else {
                        warn!(
                            "{}: failed to increment lockout counter for {:?}",
                            LOG_PREFIX,
                            manager.account_key(context)
                        );
                    }
                }
                self.audit(
                    self.base_event(context, AuditEventType::AuthenticationFailure)
                        .detail("event", event.id()),
                );
                self.cleanup(context);
                event
            }
            None => {
                debug!("{}: no validator was able to handle the request", LOG_PREFIX);
                Event::RequestUnsupported
            }
        }
    }

    async fn succeed(
        &self,
        context: &mut AuthenticationContext,
        results: Vec<Subject>,
        warning_event: Option<Event>,
    ) -> Event {
        if let Some(manager) = &self.lockout_manager {
            if manager.clear(context).await {
                self.audit_lockout(context, manager.as_ref(), AuditEventType::LockoutCleared);
            } else {
                warn!(
                    "{}: failed to clear lockout state for {:?}",
                    LOG_PREFIX,
                    manager.account_key(context)
                );
            }
        }

        let mut subject = Subject::new();
        for result in results {
            subject.merge(result);
        }

        let flow_id = context
            .flow_selection
            .attempted_flow()
            .map(|flow| flow.id().to_string())
            .unwrap_or_else(|| self.default_flow_id.clone());

        let result = match AuthenticationResult::new(flow_id, subject) {
            Ok(result) => result,
            Err(error) => {
                warn!("{}: {}", LOG_PREFIX, error);
                let event = self.record_error(context, error, Some(Event::AuthnException));
                self.cleanup(context);
                return event;
            }
        };

        if let Some(rpc) = context.requested_principal.as_mut() {
            if rpc.matching.is_none() {
                let candidates = result
                    .subject()
                    .principals
                    .iter()
                    .filter(|p| p.is_authn_context());
                rpc.matching = rpc.find_match(candidates);
            }
        }

        self.audit(
            self.base_event(context, AuditEventType::AuthenticationSuccess)
                .flow_id(result.flow_id()),
        );
        context.authentication_result = Some(result);

        if let Some(hook) = &self.success_hook {
            hook(context);
        }

        self.cleanup(context);
        warning_event.unwrap_or(Event::Proceed)
    }

    /// Record an error and work out the event it maps to.
    fn record_error(
        &self,
        context: &mut AuthenticationContext,
        error: CredentialError,
        fallback: Option<Event>,
    ) -> Event {
        let message = error.to_string();
        let event = match self.error_classifier.classify(&message) {
            Some(id) => {
                context.errors.classified_errors.push(id.to_string());
                Event::from_id(id)
            }
            None => fallback.unwrap_or(Event::AuthnException),
        };
        context.errors.exceptions.push(error);
        event
    }

    /// Classify and record validator warnings; returns the last warning event.
    fn record_warnings(
        &self,
        context: &mut AuthenticationContext,
        warnings: &mut Warnings,
    ) -> Option<Event> {
        let mut last = None;
        for warning in warnings.drain() {
            let event = self
                .warning_classifier
                .classify_event(&warning.message)
                .unwrap_or(warning.event);
            info!("{}: validator warning {}: {}", LOG_PREFIX, event, warning.message);
            context.warnings.classified_warnings.push(event.id().to_string());
            last = Some(event);
        }
        last
    }

    fn record_attempt(
        &self,
        context: &AuthenticationContext,
        validator_id: &str,
        metric: &str,
        outcome: &str,
        error: Option<&CredentialError>,
    ) {
        let mut event = self
            .base_event(context, AuditEventType::ValidatorAttempt)
            .validator_id(validator_id)
            .metric(metric)
            .detail("outcome", outcome);
        if let Some(error) = error {
            event = event.error(error.to_string());
        }
        self.audit(event);
    }

    fn base_event(&self, context: &AuthenticationContext, event_type: AuditEventType) -> AuditEvent {
        let mut event = AuditEvent::new(event_type);
        if let Some(username) = context.username() {
            event = event.username(username);
        }
        if let Some(address) = &context.client_address {
            event = event.ip_address(address.as_str());
        }
        event
    }

    fn audit_lockout(
        &self,
        context: &AuthenticationContext,
        manager: &dyn AccountLockoutManager,
        event_type: AuditEventType,
    ) {
        let mut event = self.base_event(context, event_type);
        if let Some(key) = manager.account_key(context) {
            event = event.detail("key", key);
        }
        self.audit(event);
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(logger) = &self.audit_logger {
            logger.log(event);
        }
    }

    fn cleanup(&self, context: &mut AuthenticationContext) {
        if self.cleanup_credentials {
            context.clear_credentials();
        }
    }
}

impl std::fmt::Debug for ValidateCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.validators.iter().map(|v| v.id()).collect();
        f.debug_struct("ValidateCredentials")
            .field("validators", &ids)
            .field("require_all", &self.require_all)
            .field("lockout_manager", &self.lockout_manager.is_some())
            .field("metric_prefix", &self.metric_prefix)
            .finish()
    }
}
