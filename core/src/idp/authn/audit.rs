//! Authentication audit logging.
//!
//! Records structured events for validator attempts, successes, failures and
//! lockouts. Events are fanned out to any number of handlers.
//!
//! # Example
//!
//! ```ignore
//! use idp_authn_core::idp::authn::audit::{AuditLogger, InMemoryAuditStore, TracingHandler};
//!
//! let store = InMemoryAuditStore::new();
//! let logger = AuditLogger::new()
//!     .add_handler(TracingHandler::new())
//!     .add_handler(store.clone());
//!
//! let action = ValidateCredentials::new(validators).audit_logger(Arc::new(logger));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

/// Types of audit events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum AuditEventType {
    /// One validator ran
    ValidatorAttempt,
    /// Overall authentication succeeded
    AuthenticationSuccess,
    /// Overall authentication failed
    AuthenticationFailure,
    /// Authentication refused because the account is locked
    AccountLocked,
    /// Lockout counter incremented
    LockoutIncremented,
    /// Lockout state cleared
    LockoutCleared,
    /// Subject canonicalized to a principal name
    SubjectCanonicalized,
    /// CAS service ticket issued
    TicketGranted,
    /// CAS service ticket validated
    TicketValidated,
    /// Custom event
    Custom(String),
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEventType::ValidatorAttempt => write!(f, "VALIDATOR_ATTEMPT"),
            AuditEventType::AuthenticationSuccess => write!(f, "AUTHENTICATION_SUCCESS"),
            AuditEventType::AuthenticationFailure => write!(f, "AUTHENTICATION_FAILURE"),
            AuditEventType::AccountLocked => write!(f, "ACCOUNT_LOCKED"),
            AuditEventType::LockoutIncremented => write!(f, "LOCKOUT_INCREMENTED"),
            AuditEventType::LockoutCleared => write!(f, "LOCKOUT_CLEARED"),
            AuditEventType::SubjectCanonicalized => write!(f, "SUBJECT_CANONICALIZED"),
            AuditEventType::TicketGranted => write!(f, "TICKET_GRANTED"),
            AuditEventType::TicketValidated => write!(f, "TICKET_VALIDATED"),
            AuditEventType::Custom(name) => write!(f, "CUSTOM:{}", name),
        }
    }
}

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditSeverity::Info => write!(f, "INFO"),
            AuditSeverity::Warning => write!(f, "WARN"),
            AuditSeverity::Error => write!(f, "ERROR"),
        }
    }
}

impl AuditEventType {
    /// Severity used when none is set explicitly.
    pub fn default_severity(&self) -> AuditSeverity {
        match self {
            AuditEventType::AuthenticationFailure | AuditEventType::LockoutIncremented => {
                AuditSeverity::Warning
            }
            AuditEventType::AccountLocked => AuditSeverity::Error,
            _ => AuditSeverity::Info,
        }
    }
}

/// A structured audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    pub flow_id: Option<String>,
    pub validator_id: Option<String>,
    pub metric: Option<String>,
    pub details: HashMap<String, String>,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            id: generate_event_id(),
            timestamp: Utc::now(),
            severity: event_type.default_severity(),
            event_type,
            username: None,
            ip_address: None,
            flow_id: None,
            validator_id: None,
            metric: None,
            details: HashMap::new(),
            error: None,
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn flow_id(mut self, flow_id: impl Into<String>) -> Self {
        self.flow_id = Some(flow_id.into());
        self
    }

    pub fn validator_id(mut self, id: impl Into<String>) -> Self {
        self.validator_id = Some(id.into());
        self
    }

    pub fn metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    pub fn severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// One-line rendering for text logs.
    pub fn to_log_line(&self) -> String {
        let mut parts = vec![
            format!("[{}]", self.severity),
            format!("[{}]", self.event_type),
        ];

        if let Some(ref username) = self.username {
            parts.push(format!("user={}", username));
        }
        if let Some(ref ip) = self.ip_address {
            parts.push(format!("ip={}", ip));
        }
        if let Some(ref flow) = self.flow_id {
            parts.push(format!("flow={}", flow));
        }
        if let Some(ref metric) = self.metric {
            parts.push(format!("metric={}", metric));
        }
        if let Some(ref error) = self.error {
            parts.push(format!("error=\"{}\"", error));
        }
        let mut details: Vec<_> = self.details.iter().collect();
        details.sort();
        for (k, v) in details {
            parts.push(format!("{}={}", k, v));
        }

        parts.join(" ")
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_log_line())
    }
}

fn generate_event_id() -> String {
    let micros = Utc::now().timestamp_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", micros, random)
}

/// Receives audit events.
pub trait AuditEventHandler: Send + Sync {
    fn handle(&self, event: &AuditEvent);
}

/// Emits events through `tracing`.
#[derive(Debug, Clone)]
pub struct TracingHandler {
    min_severity: AuditSeverity,
    json: bool,
}

impl Default for TracingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingHandler {
    pub fn new() -> Self {
        Self {
            min_severity: AuditSeverity::Info,
            json: false,
        }
    }

    pub fn min_severity(mut self, severity: AuditSeverity) -> Self {
        self.min_severity = severity;
        self
    }

    /// Emit events as JSON documents instead of log lines.
    pub fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    fn render(&self, event: &AuditEvent) -> String {
        if self.json {
            event.to_json()
        } else {
            event.to_log_line()
        }
    }
}

impl AuditEventHandler for TracingHandler {
    fn handle(&self, event: &AuditEvent) {
        if event.severity < self.min_severity {
            return;
        }
        let line = self.render(event);
        match event.severity {
            AuditSeverity::Info => tracing::info!(target: "idp::audit", "{}", line),
            AuditSeverity::Warning => tracing::warn!(target: "idp::audit", "{}", line),
            AuditSeverity::Error => tracing::error!(target: "idp::audit", "{}", line),
        }
    }
}

/// Wraps a closure as a handler.
pub struct ClosureHandler<F>
where
    F: Fn(&AuditEvent) + Send + Sync,
{
    handler: F,
}

impl<F> ClosureHandler<F>
where
    F: Fn(&AuditEvent) + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> AuditEventHandler for ClosureHandler<F>
where
    F: Fn(&AuditEvent) + Send + Sync,
{
    fn handle(&self, event: &AuditEvent) {
        (self.handler)(event)
    }
}

/// Keeps events in memory, bounded by `max_events`.
#[derive(Clone)]
pub struct InMemoryAuditStore {
    events: Arc<Mutex<Vec<AuditEvent>>>,
    max_events: usize,
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            max_events: 10000,
        }
    }

    pub fn max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.lock().clone()
    }

    pub fn events_by_type(&self, event_type: &AuditEventType) -> Vec<AuditEvent> {
        self.lock()
            .iter()
            .filter(|e| &e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AuditEventHandler for InMemoryAuditStore {
    fn handle(&self, event: &AuditEvent) {
        let mut events = self.lock();
        events.push(event.clone());
        if events.len() > self.max_events {
            events.remove(0);
        }
    }
}

/// Fans events out to its handlers.
pub struct AuditLogger {
    handlers: Vec<Arc<dyn AuditEventHandler>>,
    enabled: bool,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            enabled: true,
        }
    }

    /// Logger that writes through `tracing`.
    pub fn with_tracing() -> Self {
        Self::new().add_handler(TracingHandler::new())
    }

    pub fn add_handler<H: AuditEventHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn with_handler<F>(self, handler: F) -> Self
    where
        F: Fn(&AuditEvent) + Send + Sync + 'static,
    {
        self.add_handler(ClosureHandler::new(handler))
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn log(&self, event: AuditEvent) {
        if !self.enabled {
            return;
        }
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

impl fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLogger")
            .field("handlers", &self.handlers.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}
