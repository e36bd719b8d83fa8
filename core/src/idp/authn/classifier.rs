//! Message classification.
//!
//! Maps free-form failure messages to named events so the user interface can
//! show a specific reason without exposing error internals. Mappings are
//! tried in insertion order and patterns match anywhere in the message,
//! ignoring case.

use regex::Regex;

use crate::idp::error::{ConfigError, Event};

/// Ordered event id to pattern mappings.
#[derive(Debug, Clone, Default)]
pub struct MessageClassifier {
    mappings: Vec<(String, Vec<Regex>)>,
}

impl MessageClassifier {
    /// An empty classifier that classifies nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping from an event id to message patterns.
    pub fn map(mut self, event_id: impl Into<String>, patterns: &[&str]) -> Result<Self, ConfigError> {
        let event_id = event_id.into();
        let compiled = patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("(?i){}", p)).map_err(|e| ConfigError::Invalid {
                    name: format!("classifier pattern for {}", event_id),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.mappings.push((event_id, compiled));
        Ok(self)
    }

    /// Default mappings for validator errors.
    pub fn default_errors() -> Self {
        Self::new()
            .with_literals("UnknownUsername", &["No such user", "Unknown user", "user not found"])
            .with_literals(
                "InvalidPassword",
                &["Invalid password", "Invalid credentials", "Bad credentials"],
            )
            .with_literals("NoCredentials", &["No username available", "No password available"])
            .with_literals("AccountLocked", &["Account locked", "account is locked"])
            .with_literals("AccountDisabled", &["Account disabled", "account is disabled"])
            .with_literals("ExpiredPassword", &["Password expired", "password has expired"])
            .with_literals(
                "UntrustedCertificate",
                &["not trusted", "certificate expired", "not yet valid"],
            )
    }

    /// Default mappings for validator warnings.
    pub fn default_warnings() -> Self {
        Self::new().with_literals(
            "ExpiringPassword",
            &["password will expire", "password expires soon"],
        )
    }

    // Literal patterns are escaped, so compilation cannot fail.
    fn with_literals(mut self, event_id: &str, literals: &[&str]) -> Self {
        let compiled = literals
            .iter()
            .filter_map(|l| Regex::new(&format!("(?i){}", regex::escape(l))).ok())
            .collect();
        self.mappings.push((event_id.to_string(), compiled));
        self
    }

    /// Event id of the first mapping with a matching pattern.
    pub fn classify(&self, message: &str) -> Option<&str> {
        self.mappings
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(message)))
            .map(|(event_id, _)| event_id.as_str())
    }

    /// Classify into an event.
    pub fn classify_event(&self, message: &str) -> Option<Event> {
        self.classify(message).map(Event::from_id)
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
