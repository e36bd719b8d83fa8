//! SAML 2.0 assertion building.
//!
//! Only the parts needed to report an authentication are modeled: the
//! response, its assertions and their `AuthnStatement`s.

mod statement;

pub use statement::AddAuthnStatementToAssertion;

use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::idp::xml::escape_xml;

/// Produces unique XML ids.
pub trait IdentifierGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random 128-bit hex ids, prefixed with `_` so they are valid NCNames.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdentifierGenerator;

impl IdentifierGenerator for RandomIdentifierGenerator {
    fn generate(&self) -> String {
        let random: u128 = rand::thread_rng().gen();
        format!("_{:032x}", random)
    }
}

fn saml_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `AuthnContext` of a statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnContext {
    pub class_ref: Option<String>,
    pub decl_ref: Option<String>,
    pub authenticating_authorities: Vec<String>,
}

/// `SubjectLocality` of a statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectLocality {
    pub address: Option<String>,
}

/// A SAML `AuthnStatement`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthnStatement {
    pub authn_instant: DateTime<Utc>,
    pub session_index: Option<String>,
    pub session_not_on_or_after: Option<DateTime<Utc>>,
    pub subject_locality: Option<SubjectLocality>,
    pub authn_context: AuthnContext,
}

impl AuthnStatement {
    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"<saml:AuthnStatement AuthnInstant="{}""#,
            saml_instant(&self.authn_instant)
        );
        if let Some(index) = &self.session_index {
            xml.push_str(&format!(r#" SessionIndex="{}""#, escape_xml(index)));
        }
        if let Some(not_on_or_after) = &self.session_not_on_or_after {
            xml.push_str(&format!(
                r#" SessionNotOnOrAfter="{}""#,
                saml_instant(not_on_or_after)
            ));
        }
        xml.push('>');

        if let Some(SubjectLocality {
            address: Some(address),
        }) = &self.subject_locality
        {
            xml.push_str(&format!(
                r#"<saml:SubjectLocality Address="{}"/>"#,
                escape_xml(address)
            ));
        }

        xml.push_str("<saml:AuthnContext>");
        if let Some(class_ref) = &self.authn_context.class_ref {
            xml.push_str(&format!(
                "<saml:AuthnContextClassRef>{}</saml:AuthnContextClassRef>",
                escape_xml(class_ref)
            ));
        }
        if let Some(decl_ref) = &self.authn_context.decl_ref {
            xml.push_str(&format!(
                "<saml:AuthnContextDeclRef>{}</saml:AuthnContextDeclRef>",
                escape_xml(decl_ref)
            ));
        }
        for authority in &self.authn_context.authenticating_authorities {
            xml.push_str(&format!(
                "<saml:AuthenticatingAuthority>{}</saml:AuthenticatingAuthority>",
                escape_xml(authority)
            ));
        }
        xml.push_str("</saml:AuthnContext></saml:AuthnStatement>");
        xml
    }
}

/// A SAML `Assertion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub id: String,
    pub issue_instant: DateTime<Utc>,
    pub issuer: Option<String>,
    pub authn_statements: Vec<AuthnStatement>,
}

impl Assertion {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            issue_instant: Utc::now(),
            issuer: None,
            authn_statements: Vec::new(),
        }
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="{}" Version="2.0" IssueInstant="{}">"#,
            escape_xml(&self.id),
            saml_instant(&self.issue_instant)
        );
        if let Some(issuer) = &self.issuer {
            xml.push_str(&format!("<saml:Issuer>{}</saml:Issuer>", escape_xml(issuer)));
        }
        for statement in &self.authn_statements {
            xml.push_str(&statement.to_xml());
        }
        xml.push_str("</saml:Assertion>");
        xml
    }
}

/// A SAML `Response` under construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub assertions: Vec<Assertion>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }
}
