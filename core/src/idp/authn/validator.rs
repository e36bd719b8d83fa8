//! The credential validator seam.

use async_trait::async_trait;

use crate::idp::authn::context::AuthenticationContext;
use crate::idp::authn::principal::Subject;
use crate::idp::error::{CredentialError, Event};

/// A warning raised by a validator that did not stop it from succeeding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Event the validator suggests when no classifier pattern matches.
    pub event: Event,
    pub message: String,
}

/// Side channel for validator warnings.
///
/// Errors travel through the `Err` side of [`CredentialValidator::validate`];
/// warnings are collected here so that a successful validation can still
/// report them.
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    entries: Vec<Warning>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, event: Event, message: impl Into<String>) {
        self.entries.push(Warning {
            event,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, Warning> {
        self.entries.drain(..)
    }
}

/// Validates one kind of credential.
///
/// Implementations are configured once and shared across concurrent requests.
/// They must not keep per-request state.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Stable id, used in audit records and metric names.
    fn id(&self) -> &str;

    /// Attempt validation.
    ///
    /// Returns `Ok(None)` when the validator does not apply to the presented
    /// credentials, `Ok(Some(subject))` on success and `Err` on failure.
    async fn validate(
        &self,
        context: &AuthenticationContext,
        warnings: &mut Warnings,
    ) -> Result<Option<Subject>, CredentialError>;
}
