//! # IdP Authn Core
//!
//! Authentication and subject canonicalization engine for SAML and CAS
//! identity providers.
//!
//! The crate runs pluggable credential validators under an all-or-first-success
//! policy, applies account lockout, selects authentication and canonicalization
//! flows through a shared selection state machine, and hands the finished
//! result to protocol adapters that build SAML authentication statements or
//! CAS service tickets.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use idp_authn_core::idp::authn::{
//!     AuthenticationContext, AuthenticationEngine, AuthenticationFlowDescriptor,
//!     JaasCredentialValidator, ValidateCredentials,
//! };
//!
//! let action = ValidateCredentials::new(vec![Arc::new(jaas_validator)]);
//! let flow = AuthenticationFlowDescriptor::new("authn/Password", Arc::new(action));
//! let engine = AuthenticationEngine::new().authentication_flow(flow)?;
//!
//! let mut ctx = AuthenticationContext::new().with_username_password("jdoe", "changeit");
//! let event = engine.authenticate(&mut ctx).await;
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cas` | Yes | CAS service ticket grant and validation actions |
//! | `saml` | Yes | SAML AuthnStatement construction |
//! | `argon2` | Yes | Argon2 password encoder |
//! | `admin-api` | No | Actix Web endpoint for lockout administration |
//! | `full` | No | All features enabled |

pub mod idp;
