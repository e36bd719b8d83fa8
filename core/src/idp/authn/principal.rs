//! Principals, credentials and the subject that carries them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::idp::authn::x509::X509Certificate;

/// SAML 2.0 authentication context class references.
pub mod class_ref {
    pub const UNSPECIFIED: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:unspecified";
    pub const INTERNET_PROTOCOL: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:InternetProtocol";
    pub const PASSWORD: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:Password";
    pub const PASSWORD_PROTECTED_TRANSPORT: &str =
        "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport";
    pub const X509: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:X509";
    pub const TLS_CLIENT: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:TLSClient";
    pub const KERBEROS: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:Kerberos";
    pub const MULTI_FACTOR: &str = "https://refeds.org/profile/mfa";
}

/// SAML name identifier formats.
pub mod name_id_format {
    pub const UNSPECIFIED: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified";
    pub const EMAIL_ADDRESS: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress";
    pub const X509_SUBJECT_NAME: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:X509SubjectName";
    pub const PERSISTENT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent";
    pub const TRANSIENT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:transient";
}

/// A SAML NameID carried as a principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameIdPrincipal {
    pub value: String,
    pub format: Option<String>,
    pub name_qualifier: Option<String>,
    pub sp_name_qualifier: Option<String>,
}

impl NameIdPrincipal {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
            name_qualifier: None,
            sp_name_qualifier: None,
        }
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn name_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.name_qualifier = Some(qualifier.into());
        self
    }

    pub fn sp_name_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.sp_name_qualifier = Some(qualifier.into());
        self
    }

    /// Format URN, defaulting to `unspecified` when absent.
    pub fn effective_format(&self) -> &str {
        self.format.as_deref().unwrap_or(name_id_format::UNSPECIFIED)
    }
}

/// A typed identity fact about a subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Principal {
    /// A plain user name.
    Username(String),
    /// An X.500 distinguished name.
    X500(String),
    /// A SAML name identifier.
    NameId(NameIdPrincipal),
    /// A SAML authentication context class reference.
    AuthnContextClassRef(String),
    /// A SAML authentication context declaration reference.
    AuthnContextDeclRef(String),
    /// Authorities that authenticated the subject on behalf of this IdP.
    ProxyAuthentication(Vec<String>),
    /// Any other principal type.
    Custom { kind: String, name: String },
}

impl Principal {
    pub fn username(name: impl Into<String>) -> Self {
        Principal::Username(name.into())
    }

    pub fn class_ref(uri: impl Into<String>) -> Self {
        Principal::AuthnContextClassRef(uri.into())
    }

    pub fn decl_ref(uri: impl Into<String>) -> Self {
        Principal::AuthnContextDeclRef(uri.into())
    }

    /// The principal's name. Proxy principals join their authorities.
    pub fn name(&self) -> String {
        match self {
            Principal::Username(name)
            | Principal::X500(name)
            | Principal::AuthnContextClassRef(name)
            | Principal::AuthnContextDeclRef(name) => name.clone(),
            Principal::NameId(name_id) => name_id.value.clone(),
            Principal::ProxyAuthentication(authorities) => authorities.join(" "),
            Principal::Custom { name, .. } => name.clone(),
        }
    }

    /// Short type label used in log and error messages.
    pub fn kind(&self) -> &str {
        match self {
            Principal::Username(_) => "UsernamePrincipal",
            Principal::X500(_) => "X500Principal",
            Principal::NameId(_) => "NameIDPrincipal",
            Principal::AuthnContextClassRef(_) => "AuthnContextClassRefPrincipal",
            Principal::AuthnContextDeclRef(_) => "AuthnContextDeclRefPrincipal",
            Principal::ProxyAuthentication(_) => "ProxyAuthenticationPrincipal",
            Principal::Custom { kind, .. } => kind,
        }
    }

    /// Whether this principal describes the authentication method rather than the user.
    pub fn is_authn_context(&self) -> bool {
        matches!(
            self,
            Principal::AuthnContextClassRef(_) | Principal::AuthnContextDeclRef(_)
        )
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.name())
    }
}

/// Credential material attached to a subject.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    Certificate(X509Certificate),
    Token { kind: String, value: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password([REDACTED])"),
            Credential::Certificate(cert) => f.debug_tuple("Certificate").field(cert).finish(),
            Credential::Token { kind, .. } => f
                .debug_struct("Token")
                .field("kind", kind)
                .field("value", &"[REDACTED]")
                .finish(),
        }
    }
}

/// An unordered bag of principals and credentials for one authenticated entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    pub principals: Vec<Principal>,
    pub public_credentials: Vec<Credential>,
    pub private_credentials: Vec<Credential>,
}

impl Subject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a principal.
    pub fn principal(mut self, principal: Principal) -> Self {
        self.principals.push(principal);
        self
    }

    /// Add a public credential.
    pub fn public_credential(mut self, credential: Credential) -> Self {
        self.public_credentials.push(credential);
        self
    }

    /// Add a private credential.
    pub fn private_credential(mut self, credential: Credential) -> Self {
        self.private_credentials.push(credential);
        self
    }

    /// Union another subject into this one. Duplicates are kept.
    pub fn merge(&mut self, other: Subject) {
        self.principals.extend(other.principals);
        self.public_credentials.extend(other.public_credentials);
        self.private_credentials.extend(other.private_credentials);
    }

    /// Names of every `Username` principal.
    pub fn usernames(&self) -> Vec<&str> {
        self.principals
            .iter()
            .filter_map(|p| match p {
                Principal::Username(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every `NameId` principal.
    pub fn name_ids(&self) -> Vec<&NameIdPrincipal> {
        self.principals
            .iter()
            .filter_map(|p| match p {
                Principal::NameId(name_id) => Some(name_id),
                _ => None,
            })
            .collect()
    }

    /// Every `X500` principal.
    pub fn x500_names(&self) -> Vec<&str> {
        self.principals
            .iter()
            .filter_map(|p| match p {
                Principal::X500(dn) => Some(dn.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Authority lists of every proxy authentication principal.
    pub fn proxy_authorities(&self) -> Vec<&[String]> {
        self.principals
            .iter()
            .filter_map(|p| match p {
                Principal::ProxyAuthentication(authorities) => Some(authorities.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn has_principals(&self) -> bool {
        !self.principals.is_empty()
    }
}
