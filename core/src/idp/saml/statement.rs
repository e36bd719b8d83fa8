use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::idp::authn::context::AuthenticationContext;
use crate::idp::authn::principal::{class_ref, Principal};
use crate::idp::error::{ConfigError, Event};
use crate::idp::saml::{
    Assertion, AuthnContext, AuthnStatement, IdentifierGenerator, RandomIdentifierGenerator,
    Response, SubjectLocality,
};

/// Adds an `AuthnStatement` describing the authentication result to a response.
pub struct AddAuthnStatementToAssertion {
    id_generator: Arc<dyn IdentifierGenerator>,
    default_class_ref: String,
    session_lifetime: Option<Duration>,
    add_address: bool,
    suppress_authenticating_authority: bool,
    statement_in_own_assertion: bool,
    issuer: Option<String>,
}

impl Default for AddAuthnStatementToAssertion {
    fn default() -> Self {
        Self::new()
    }
}

impl AddAuthnStatementToAssertion {
    pub fn new() -> Self {
        Self {
            id_generator: Arc::new(RandomIdentifierGenerator),
            default_class_ref: class_ref::PASSWORD_PROTECTED_TRANSPORT.to_string(),
            session_lifetime: None,
            add_address: true,
            suppress_authenticating_authority: false,
            statement_in_own_assertion: false,
            issuer: None,
        }
    }

    pub fn id_generator(mut self, generator: Arc<dyn IdentifierGenerator>) -> Self {
        self.id_generator = generator;
        self
    }

    /// Class reference used when no requested principal was matched.
    pub fn default_class_ref(mut self, uri: impl Into<String>) -> Self {
        self.default_class_ref = uri.into();
        self
    }

    /// Sets `SessionNotOnOrAfter` to the authentication instant plus this lifetime.
    pub fn session_lifetime(mut self, lifetime: Duration) -> Self {
        self.session_lifetime = Some(lifetime);
        self
    }

    pub fn add_address(mut self, add: bool) -> Self {
        self.add_address = add;
        self
    }

    pub fn suppress_authenticating_authority(mut self, suppress: bool) -> Self {
        self.suppress_authenticating_authority = suppress;
        self
    }

    /// Put the statement in a new assertion instead of the first existing one.
    pub fn statement_in_own_assertion(mut self, own: bool) -> Self {
        self.statement_in_own_assertion = own;
        self
    }

    /// Issuer of assertions created by this action.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_class_ref.is_empty() {
            return Err(ConfigError::Missing {
                name: "default_class_ref".into(),
            });
        }
        Ok(())
    }

    fn authn_context(&self, context: &AuthenticationContext) -> AuthnContext {
        let matching = context
            .requested_principal
            .as_ref()
            .and_then(|rpc| rpc.matching.as_ref());
        match matching {
            Some(Principal::AuthnContextClassRef(uri)) => AuthnContext {
                class_ref: Some(uri.clone()),
                ..Default::default()
            },
            Some(Principal::AuthnContextDeclRef(uri)) => AuthnContext {
                decl_ref: Some(uri.clone()),
                ..Default::default()
            },
            _ => AuthnContext {
                class_ref: Some(self.default_class_ref.clone()),
                ..Default::default()
            },
        }
    }

    pub fn execute(&self, context: &AuthenticationContext, response: &mut Response) -> Event {
        let Some(result) = &context.authentication_result else {
            error!("AddAuthnStatementToAssertion: no authentication result");
            return Event::InvalidAuthenticationContext;
        };

        let mut authn_context = self.authn_context(context);
        if !self.suppress_authenticating_authority {
            match result.subject().proxy_authorities().as_slice() {
                [] => {}
                [authorities] => {
                    authn_context.authenticating_authorities = authorities.to_vec();
                }
                _ => warn!(
                    "AddAuthnStatementToAssertion: multiple proxy authentication principals, \
                     omitting AuthenticatingAuthority"
                ),
            }
        }

        let session_not_on_or_after = match self.session_lifetime {
            Some(lifetime) => match chrono::Duration::from_std(lifetime) {
                Ok(lifetime) => Some(result.authentication_instant() + lifetime),
                Err(e) => {
                    warn!("AddAuthnStatementToAssertion: session lifetime out of range: {}", e);
                    None
                }
            },
            None => None,
        };

        let subject_locality = match (&context.client_address, self.add_address) {
            (Some(address), true) => Some(SubjectLocality {
                address: Some(address.clone()),
            }),
            _ => None,
        };

        let statement = AuthnStatement {
            authn_instant: result.authentication_instant(),
            session_index: Some(self.id_generator.generate()),
            session_not_on_or_after,
            subject_locality,
            authn_context,
        };

        if self.statement_in_own_assertion || response.assertions.is_empty() {
            let mut assertion = Assertion::new(self.id_generator.generate());
            assertion.issuer = self.issuer.clone();
            response.assertions.push(assertion);
        }
        let target = if self.statement_in_own_assertion {
            response.assertions.last_mut()
        } else {
            response.assertions.first_mut()
        };
        match target {
            Some(assertion) => {
                debug!(
                    "AddAuthnStatementToAssertion: added statement to assertion {}",
                    assertion.id
                );
                assertion.authn_statements.push(statement);
                Event::Proceed
            }
            None => Event::InvalidAuthenticationContext,
        }
    }
}

impl fmt::Debug for AddAuthnStatementToAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddAuthnStatementToAssertion")
            .field("default_class_ref", &self.default_class_ref)
            .field("session_lifetime", &self.session_lifetime)
            .field("add_address", &self.add_address)
            .field(
                "suppress_authenticating_authority",
                &self.suppress_authenticating_authority,
            )
            .field("statement_in_own_assertion", &self.statement_in_own_assertion)
            .finish()
    }
}
