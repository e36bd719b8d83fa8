//! JAAS-style login configurations and the validator built on them.
//!
//! A [`LoginConfiguration`] maps names to stacks of login modules, each with a
//! [`ControlFlag`] deciding how its outcome contributes to the overall login:
//!
//! | Flag | On success | On failure |
//! |------|------------|------------|
//! | `Required` | continue | remember the failure, continue |
//! | `Requisite` | continue | stop, fail |
//! | `Sufficient` | stop, succeed unless a required module already failed | continue |
//! | `Optional` | continue | continue |
//!
//! The login fails if any required or requisite module failed, or if no
//! module succeeded at all.
//!
//! # Example
//!
//! ```ignore
//! let module = InMemoryLoginModule::new(Arc::new(NoOpPasswordEncoder))
//!     .user("PETER_THE_PRINCIPAL", "changeit")?;
//! let config = LoginConfiguration::new()
//!     .entry("ShibUserPassAuth", Arc::new(module), ControlFlag::Required);
//!
//! let validator = JaasCredentialValidator::new("jaas", Arc::new(config))
//!     .login_config_name("ShibUserPassAuth");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use crate::idp::authn::context::AuthenticationContext;
use crate::idp::authn::password::PasswordEncoder;
use crate::idp::authn::principal::{Credential, Principal, Subject};
use crate::idp::authn::validator::{CredentialValidator, Warnings};
use crate::idp::error::{ConfigError, CredentialError};

/// How a module's outcome affects the overall login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlag {
    Required,
    Requisite,
    Sufficient,
    Optional,
}

/// One pluggable login step.
#[async_trait]
pub trait LoginModule: Send + Sync {
    /// Authenticate. `Ok(None)` means the module should be ignored.
    async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Vec<Principal>>, CredentialError>;
}

struct LoginModuleEntry {
    module: Arc<dyn LoginModule>,
    flag: ControlFlag,
}

/// Named stacks of login modules.
#[derive(Default)]
pub struct LoginConfiguration {
    entries: HashMap<String, Vec<LoginModuleEntry>>,
}

impl LoginConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module to the named stack.
    pub fn entry(
        mut self,
        name: impl Into<String>,
        module: Arc<dyn LoginModule>,
        flag: ControlFlag,
    ) -> Self {
        self.entries
            .entry(name.into())
            .or_default()
            .push(LoginModuleEntry { module, flag });
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Run the named stack.
    pub async fn login(
        &self,
        name: &str,
        username: &str,
        password: &str,
    ) -> Result<Vec<Principal>, CredentialError> {
        let entries = self.entries.get(name).ok_or_else(|| {
            CredentialError::login(format!("No LoginModules configured for {}", name))
        })?;

        let mut principals = Vec::new();
        let mut succeeded = false;
        let mut first_required_error: Option<CredentialError> = None;
        let mut first_error: Option<CredentialError> = None;

        for entry in entries {
            match entry.module.login(username, password).await {
                Ok(Some(found)) => {
                    principals.extend(found);
                    succeeded = true;
                    if entry.flag == ControlFlag::Sufficient && first_required_error.is_none() {
                        return Ok(principals);
                    }
                }
                Ok(None) => {}
                Err(error) => match entry.flag {
                    ControlFlag::Requisite => {
                        return Err(first_required_error.unwrap_or(error));
                    }
                    ControlFlag::Required => {
                        first_required_error.get_or_insert(error);
                    }
                    ControlFlag::Sufficient | ControlFlag::Optional => {
                        first_error.get_or_insert(error);
                    }
                },
            }
        }

        if let Some(error) = first_required_error {
            return Err(error);
        }
        if !succeeded {
            return Err(first_error
                .unwrap_or_else(|| CredentialError::login("Login Failure: all modules ignored")));
        }
        Ok(principals)
    }
}

/// Login module over an in-memory user table.
pub struct InMemoryLoginModule {
    users: HashMap<String, String>,
    encoder: Arc<dyn PasswordEncoder>,
}

impl InMemoryLoginModule {
    pub fn new(encoder: Arc<dyn PasswordEncoder>) -> Self {
        Self {
            users: HashMap::new(),
            encoder,
        }
    }

    /// Add a user, encoding the password.
    pub fn user(mut self, username: impl Into<String>, password: &str) -> Result<Self, ConfigError> {
        let encoded = self.encoder.encode(password)?;
        self.users.insert(username.into(), encoded);
        Ok(self)
    }
}

#[async_trait]
impl LoginModule for InMemoryLoginModule {
    async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Vec<Principal>>, CredentialError> {
        let encoded = self
            .users
            .get(username)
            .ok_or_else(|| CredentialError::login("No such user"))?;
        if !self.encoder.matches(password, encoded) {
            return Err(CredentialError::login("Invalid password"));
        }
        Ok(Some(vec![Principal::username(username)]))
    }
}

/// A login configuration name and the principals it can satisfy.
#[derive(Debug, Clone)]
pub struct LoginConfigName {
    pub name: String,
    pub supported_principals: Vec<Principal>,
}

/// Validates a username and password with a [`LoginConfiguration`].
pub struct JaasCredentialValidator {
    id: String,
    login_configuration: Arc<LoginConfiguration>,
    login_config_names: Vec<LoginConfigName>,
    match_expression: Option<Regex>,
    save_password_to_credential_set: bool,
}

impl JaasCredentialValidator {
    pub fn new(id: impl Into<String>, login_configuration: Arc<LoginConfiguration>) -> Self {
        Self {
            id: id.into(),
            login_configuration,
            login_config_names: Vec::new(),
            match_expression: None,
            save_password_to_credential_set: false,
        }
    }

    /// Add a login configuration usable for any request.
    pub fn login_config_name(self, name: impl Into<String>) -> Self {
        self.login_config_with_principals(name, Vec::new())
    }

    /// Add a login configuration that satisfies the given principals.
    pub fn login_config_with_principals(
        mut self,
        name: impl Into<String>,
        supported_principals: Vec<Principal>,
    ) -> Self {
        self.login_config_names.push(LoginConfigName {
            name: name.into(),
            supported_principals,
        });
        self
    }

    /// Only handle usernames matching this expression.
    pub fn match_expression(mut self, pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::Invalid {
            name: "match_expression".into(),
            message: e.to_string(),
        })?;
        self.match_expression = Some(regex);
        Ok(self)
    }

    /// Keep the password as a private credential of the subject.
    pub fn save_password_to_credential_set(mut self, save: bool) -> Self {
        self.save_password_to_credential_set = save;
        self
    }

    fn select_config(&self, context: &AuthenticationContext) -> Option<&LoginConfigName> {
        match &context.requested_principal {
            Some(rpc) if !rpc.requested.is_empty() => self.login_config_names.iter().find(|c| {
                c.supported_principals.is_empty()
                    || rpc.find_match(&c.supported_principals).is_some()
            }),
            _ => self.login_config_names.first(),
        }
    }
}

#[async_trait]
impl CredentialValidator for JaasCredentialValidator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn validate(
        &self,
        context: &AuthenticationContext,
        _warnings: &mut Warnings,
    ) -> Result<Option<Subject>, CredentialError> {
        let Some(up) = &context.username_password else {
            debug!("{}: no username/password available", self.id);
            return Ok(None);
        };
        let username = up
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CredentialError::login("No username available"))?;
        let password = up
            .password
            .as_deref()
            .ok_or_else(|| CredentialError::login("No password available"))?;

        if let Some(expression) = &self.match_expression {
            if !expression.is_match(username) {
                debug!("{}: username {} did not match expression", self.id, username);
                return Ok(None);
            }
        }

        let Some(config) = self.select_config(context) else {
            debug!("{}: no login configuration satisfies the request", self.id);
            return Ok(None);
        };

        debug!("{}: logging in {} with configuration {}", self.id, username, config.name);
        let principals = self
            .login_configuration
            .login(&config.name, username, password)
            .await
            .map_err(|e| {
                info!("{}: login of {} failed: {}", self.id, username, e);
                e
            })?;

        let mut subject = Subject::new();
        if !principals.iter().any(|p| matches!(p, Principal::Username(_))) {
            subject = subject.principal(Principal::username(username));
        }
        for principal in principals {
            subject = subject.principal(principal);
        }
        for principal in &config.supported_principals {
            subject = subject.principal(principal.clone());
        }
        if self.save_password_to_credential_set {
            subject = subject.private_credential(Credential::Password(password.to_string()));
        }
        Ok(Some(subject))
    }
}
