//! Authentication engine.
//!
//! # Overview
//!
//! An authentication attempt runs against a fresh [`AuthenticationContext`]:
//!
//! 1. [`SelectAuthenticationFlow`] picks the first applicable
//!    [`AuthenticationFlowDescriptor`].
//! 2. The flow's [`ValidateCredentials`] action checks account lockout, then
//!    runs its [`CredentialValidator`]s in order and records an
//!    [`AuthenticationResult`] or a named failure [`Event`].
//! 3. The subject of the result is reduced to a single principal name by the
//!    [`c14n`] flows.
//!
//! [`AuthenticationEngine`] strings these steps together.
//!
//! Shared components (validators, lockout managers, flow descriptors, actions)
//! are built once and shared behind `Arc`. They keep no per-request state.
//!
//! # Example
//!
//! ```ignore
//! use idp_authn_core::idp::authn::*;
//!
//! let jaas = JaasCredentialValidator::new("jaas", Arc::new(login_config))
//!     .login_config_name("ShibUserPassAuth");
//! let action = ValidateCredentials::new(vec![Arc::new(jaas)])
//!     .lockout_manager(Arc::new(lockout));
//!
//! let engine = AuthenticationEngine::new()
//!     .authentication_flow(AuthenticationFlowDescriptor::new("authn/Password", Arc::new(action)))?
//!     .subject_canonicalization(c14n);
//!
//! let mut ctx = AuthenticationContext::new()
//!     .with_username_password("jdoe", "changeit")
//!     .client_address("192.0.2.1");
//! let event = engine.authenticate(&mut ctx).await;
//! ```

pub mod audit;
pub mod c14n;
pub mod classifier;
pub mod context;
pub mod engine;
pub mod flow;
pub mod jaas;
pub mod ldap;
pub mod lockout;
pub mod password;
pub mod principal;
pub mod select;
pub mod storage;
pub mod validate;
pub mod validator;
pub mod x509;

pub use audit::{AuditEvent, AuditEventType, AuditLogger, AuditSeverity, InMemoryAuditStore};
pub use classifier::MessageClassifier;
pub use context::{
    AuthenticationContext, AuthenticationResult, CertificateContext, Operator,
    RequestedPrincipalContext, UsernamePasswordContext,
};
pub use engine::AuthenticationEngine;
pub use flow::{FlowDescriptor, FlowSelectionContext, FlowSelectionState, FlowSelector};
pub use jaas::{ControlFlag, InMemoryLoginModule, JaasCredentialValidator, LoginConfiguration, LoginModule};
pub use ldap::{InMemoryDirectory, LdapConfig, LdapCredentialValidator, LdapOperations};
pub use lockout::{
    AccountKeyStrategy, AccountLockoutManager, EnumeratableAccountLockoutManager, LockoutConfig,
    StorageBackedAccountLockoutManager,
};
#[cfg(feature = "argon2")]
pub use password::Argon2PasswordEncoder;
pub use password::{NoOpPasswordEncoder, PasswordEncoder};
pub use principal::{Credential, NameIdPrincipal, Principal, Subject};
pub use select::{AuthenticationFlowDescriptor, SelectAuthenticationFlow};
pub use storage::{InMemoryStorageService, StorageRecord, StorageService};
pub use validate::ValidateCredentials;
pub use validator::{CredentialValidator, Warning, Warnings};
pub use x509::{StaticTrustEngine, TrustEngine, X509Certificate, X509CredentialValidator};

pub use crate::idp::error::Event;
