//! Client certificate validation.
//!
//! Certificates arrive already parsed by the TLS terminator, so this module
//! works on a decoded [`X509Certificate`] view rather than DER bytes.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::idp::authn::context::AuthenticationContext;
use crate::idp::authn::principal::{Credential, Principal, Subject};
use crate::idp::authn::validator::{CredentialValidator, Warnings};
use crate::idp::error::CredentialError;

/// Decoded view of an X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct X509Certificate {
    pub subject_dn: String,
    pub issuer_dn: String,
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Hex SHA-256 fingerprint.
    pub fingerprint: String,
}

impl X509Certificate {
    pub fn new(
        subject_dn: impl Into<String>,
        issuer_dn: impl Into<String>,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_dn: subject_dn.into(),
            issuer_dn: issuer_dn.into(),
            serial: String::new(),
            not_before,
            not_after,
            fingerprint: String::new(),
        }
    }

    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = serial.into();
        self
    }

    pub fn fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = fingerprint.into();
        self
    }

    pub fn is_valid_at(&self, instant: DateTime<Utc>) -> bool {
        self.not_before <= instant && instant <= self.not_after
    }
}

/// Decides whether a certificate is trusted.
pub trait TrustEngine: Send + Sync {
    fn validate(
        &self,
        certificate: &X509Certificate,
        intermediates: &[X509Certificate],
    ) -> Result<(), CredentialError>;
}

/// Trusts certificates issued by known issuers or pinned by fingerprint.
#[derive(Debug, Clone, Default)]
pub struct StaticTrustEngine {
    trusted_issuers: HashSet<String>,
    trusted_fingerprints: HashSet<String>,
}

impl StaticTrustEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trusted_issuer(mut self, issuer_dn: impl Into<String>) -> Self {
        self.trusted_issuers.insert(issuer_dn.into());
        self
    }

    pub fn trusted_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.trusted_fingerprints
            .insert(fingerprint.into().to_lowercase());
        self
    }

    fn check_validity(certificate: &X509Certificate, now: DateTime<Utc>) -> Result<(), CredentialError> {
        if now > certificate.not_after {
            return Err(CredentialError::Certificate {
                message: format!("certificate expired: {}", certificate.subject_dn),
            });
        }
        if now < certificate.not_before {
            return Err(CredentialError::Certificate {
                message: format!("certificate not yet valid: {}", certificate.subject_dn),
            });
        }
        Ok(())
    }
}

impl TrustEngine for StaticTrustEngine {
    fn validate(
        &self,
        certificate: &X509Certificate,
        intermediates: &[X509Certificate],
    ) -> Result<(), CredentialError> {
        let now = Utc::now();
        Self::check_validity(certificate, now)?;

        if !certificate.fingerprint.is_empty()
            && self
                .trusted_fingerprints
                .contains(&certificate.fingerprint.to_lowercase())
        {
            return Ok(());
        }

        // Walk issuer links until a trusted issuer is reached.
        let mut current = certificate;
        let mut seen = HashSet::new();
        loop {
            if self.trusted_issuers.contains(&current.issuer_dn) {
                return Ok(());
            }
            if !seen.insert(current.subject_dn.as_str()) {
                break;
            }
            match intermediates
                .iter()
                .find(|c| c.subject_dn == current.issuer_dn)
            {
                Some(issuer) => {
                    Self::check_validity(issuer, now)?;
                    current = issuer;
                }
                None => break,
            }
        }

        Err(CredentialError::Certificate {
            message: format!("certificate not trusted: {}", certificate.subject_dn),
        })
    }
}

/// Validates the client certificate carried in the context.
pub struct X509CredentialValidator {
    id: String,
    trust_engine: Box<dyn TrustEngine>,
}

impl X509CredentialValidator {
    pub fn new(id: impl Into<String>, trust_engine: impl TrustEngine + 'static) -> Self {
        Self {
            id: id.into(),
            trust_engine: Box::new(trust_engine),
        }
    }
}

#[async_trait]
impl CredentialValidator for X509CredentialValidator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn validate(
        &self,
        context: &AuthenticationContext,
        _warnings: &mut Warnings,
    ) -> Result<Option<Subject>, CredentialError> {
        let Some(certificate_context) = &context.certificate else {
            return Ok(None);
        };
        let Some(certificate) = &certificate_context.certificate else {
            debug!("{}: no end-entity certificate", self.id);
            return Ok(None);
        };

        self.trust_engine
            .validate(certificate, &certificate_context.intermediates)?;
        debug!("{}: trusted certificate for {}", self.id, certificate.subject_dn);

        Ok(Some(
            Subject::new()
                .principal(Principal::X500(certificate.subject_dn.clone()))
                .public_credential(Credential::Certificate(certificate.clone())),
        ))
    }
}
