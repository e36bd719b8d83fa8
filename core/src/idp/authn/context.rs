//! Request-scoped authentication state.
//!
//! An [`AuthenticationContext`] is created fresh for every authentication
//! attempt. Shared components (validators, lockout managers, flow
//! descriptors) read and write it but keep no per-request state of their own.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::idp::authn::flow::{FlowSelectionContext, FlowSelectionState};
use crate::idp::authn::principal::{class_ref, Principal, Subject};
use crate::idp::authn::select::AuthenticationFlowDescriptor;
use crate::idp::authn::x509::X509Certificate;
use crate::idp::error::{ConfigError, CredentialError};

/// Extracted username and password.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct UsernamePasswordContext {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl UsernamePasswordContext {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }
}

impl std::fmt::Debug for UsernamePasswordContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsernamePasswordContext")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Extracted client certificate and chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateContext {
    pub certificate: Option<X509Certificate>,
    pub intermediates: Vec<X509Certificate>,
}

impl CertificateContext {
    pub fn new(certificate: X509Certificate) -> Self {
        Self {
            certificate: Some(certificate),
            intermediates: Vec::new(),
        }
    }

    pub fn intermediate(mut self, certificate: X509Certificate) -> Self {
        self.intermediates.push(certificate);
        self
    }
}

/// Comparison operator of a requested authentication context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    Exact,
    Minimum,
    Better,
    Maximum,
}

impl Operator {
    /// Parse the SAML `Comparison` attribute.
    pub fn from_comparison(value: &str) -> Option<Self> {
        match value {
            "exact" => Some(Operator::Exact),
            "minimum" => Some(Operator::Minimum),
            "better" => Some(Operator::Better),
            "maximum" => Some(Operator::Maximum),
            _ => None,
        }
    }
}

/// Strength ordering of the well-known class references, weakest first.
const CLASS_REF_RANKING: &[&str] = &[
    class_ref::UNSPECIFIED,
    class_ref::INTERNET_PROTOCOL,
    class_ref::PASSWORD,
    class_ref::PASSWORD_PROTECTED_TRANSPORT,
    class_ref::X509,
    class_ref::TLS_CLIENT,
    class_ref::KERBEROS,
    class_ref::MULTI_FACTOR,
];

fn rank(principal: &Principal) -> Option<usize> {
    match principal {
        Principal::AuthnContextClassRef(uri) => {
            CLASS_REF_RANKING.iter().position(|known| known == uri)
        }
        _ => None,
    }
}

/// Relying-party requirements on how the user authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedPrincipalContext {
    pub operator: Operator,
    pub requested: Vec<Principal>,
    pub matching: Option<Principal>,
}

impl RequestedPrincipalContext {
    pub fn new(operator: Operator, requested: Vec<Principal>) -> Self {
        Self {
            operator,
            requested,
            matching: None,
        }
    }

    /// Whether `candidate` satisfies `requested` under this operator.
    ///
    /// Ranked class references compare by strength. Everything else only
    /// satisfies by equality.
    pub fn satisfies(&self, requested: &Principal, candidate: &Principal) -> bool {
        if self.operator == Operator::Exact {
            return requested == candidate;
        }
        match (rank(requested), rank(candidate)) {
            (Some(want), Some(have)) => match self.operator {
                Operator::Minimum => have >= want,
                Operator::Better => have > want,
                Operator::Maximum => have <= want,
                Operator::Exact => have == want,
            },
            _ => self.operator != Operator::Better && requested == candidate,
        }
    }

    /// First candidate satisfying the requested principals, tried in request order.
    pub fn find_match<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a Principal> + Clone,
    ) -> Option<Principal> {
        self.requested.iter().find_map(|requested| {
            candidates
                .clone()
                .into_iter()
                .find(|candidate| self.satisfies(requested, candidate))
                .cloned()
        })
    }
}

/// Failures recorded during validation.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationErrorContext {
    pub exceptions: Vec<CredentialError>,
    pub classified_errors: Vec<String>,
}

impl AuthenticationErrorContext {
    pub fn is_empty(&self) -> bool {
        self.exceptions.is_empty() && self.classified_errors.is_empty()
    }
}

/// Warnings recorded during validation.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationWarningContext {
    pub classified_warnings: Vec<String>,
}

/// One successful authentication.
#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    flow_id: String,
    subject: Subject,
    authentication_instant: DateTime<Utc>,
}

impl AuthenticationResult {
    /// Build a result. A subject without principals is refused.
    pub fn new(flow_id: impl Into<String>, subject: Subject) -> Result<Self, CredentialError> {
        if !subject.has_principals() {
            return Err(CredentialError::EmptySubject);
        }
        Ok(Self {
            flow_id: flow_id.into(),
            subject,
            authentication_instant: Utc::now(),
        })
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn authentication_instant(&self) -> DateTime<Utc> {
        self.authentication_instant
    }
}

/// Per-request authentication state.
#[derive(Debug, Default)]
pub struct AuthenticationContext {
    pub username_password: Option<UsernamePasswordContext>,
    pub certificate: Option<CertificateContext>,
    pub client_address: Option<String>,
    pub requester_id: Option<String>,
    pub responder_id: Option<String>,
    pub is_passive: bool,
    pub force_authn: bool,
    pub requested_principal: Option<RequestedPrincipalContext>,
    pub flow_selection: FlowSelectionState<AuthenticationFlowDescriptor>,
    pub authentication_result: Option<AuthenticationResult>,
    pub principal_name: Option<String>,
    pub errors: AuthenticationErrorContext,
    pub warnings: AuthenticationWarningContext,
}

impl AuthenticationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_username_password(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username_password = Some(UsernamePasswordContext::new(username, password));
        self
    }

    pub fn with_certificate(mut self, certificate: CertificateContext) -> Self {
        self.certificate = Some(certificate);
        self
    }

    pub fn client_address(mut self, address: impl Into<String>) -> Self {
        self.client_address = Some(address.into());
        self
    }

    pub fn requester(mut self, id: impl Into<String>) -> Self {
        self.requester_id = Some(id.into());
        self
    }

    pub fn responder(mut self, id: impl Into<String>) -> Self {
        self.responder_id = Some(id.into());
        self
    }

    pub fn passive(mut self, passive: bool) -> Self {
        self.is_passive = passive;
        self
    }

    pub fn force_authn(mut self, force: bool) -> Self {
        self.force_authn = force;
        self
    }

    pub fn requested_principal(mut self, rpc: RequestedPrincipalContext) -> Self {
        self.requested_principal = Some(rpc);
        self
    }

    /// Install the candidate authentication flows for this attempt.
    pub fn potential_flows(
        mut self,
        flows: impl IntoIterator<Item = Arc<AuthenticationFlowDescriptor>>,
    ) -> Result<Self, ConfigError> {
        self.flow_selection = FlowSelectionState::with_flows(flows)?;
        Ok(self)
    }

    /// The submitted username, if any.
    pub fn username(&self) -> Option<&str> {
        self.username_password
            .as_ref()
            .and_then(|up| up.username.as_deref())
    }

    /// Drop transient credential material.
    pub fn clear_credentials(&mut self) {
        self.username_password = None;
        self.certificate = None;
    }
}

impl FlowSelectionContext for AuthenticationContext {
    type Descriptor = AuthenticationFlowDescriptor;

    fn selection(&self) -> &FlowSelectionState<AuthenticationFlowDescriptor> {
        &self.flow_selection
    }

    fn selection_mut(&mut self) -> &mut FlowSelectionState<AuthenticationFlowDescriptor> {
        &mut self.flow_selection
    }

    fn flow_selected(&mut self, flow: &Arc<AuthenticationFlowDescriptor>) {
        if let Some(rpc) = self.requested_principal.as_mut() {
            rpc.matching = rpc.find_match(flow.supported_principals());
        }
    }
}
