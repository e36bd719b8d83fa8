//! LDAP credential validation.
//!
//! Supports both bind strategies:
//! - direct bind, building the user DN from `user_dn_pattern`
//! - search then bind, locating the user under `base_dn` with `user_search_filter`
//!
//! The directory itself is abstracted by [`LdapOperations`] so a real client
//! can be plugged in; [`InMemoryDirectory`] serves tests and demos.
//!
//! # Example
//!
//! ```ignore
//! use idp_authn_core::idp::authn::ldap::{InMemoryDirectory, LdapConfig, LdapCredentialValidator};
//!
//! let config = LdapConfig::new("ldap://localhost:389")
//!     .base_dn("ou=people,dc=example,dc=org")
//!     .user_search_filter("(uid={0})");
//!
//! let directory = InMemoryDirectory::new().entry("uid=jdoe,ou=people,dc=example,dc=org", "jdoe", "changeit");
//! let validator = LdapCredentialValidator::new("ldap", config, Arc::new(directory))?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use derive_more::{Display, Error};
use tracing::{debug, warn};

use crate::idp::authn::context::AuthenticationContext;
use crate::idp::authn::principal::{Principal, Subject};
use crate::idp::authn::validator::{CredentialValidator, Warnings};
use crate::idp::error::{ConfigError, CredentialError};

/// Directory connection settings.
#[derive(Debug, Clone)]
pub struct LdapConfig {
    /// Server URL, e.g. `ldap://localhost:389`.
    pub url: String,
    /// Search base for user lookups.
    pub base_dn: String,
    /// Search filter, `{0}` is replaced by the username.
    pub user_search_filter: String,
    /// Direct-bind DN pattern, `{0}` is replaced by the username.
    pub user_dn_pattern: Option<String>,
    /// Service account used for searching.
    pub bind_dn: Option<String>,
    pub bind_password: Option<String>,
    pub operation_timeout: Duration,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            url: "ldap://localhost:389".to_string(),
            base_dn: String::new(),
            user_search_filter: "(uid={0})".to_string(),
            user_dn_pattern: None,
            bind_dn: None,
            bind_password: None,
            operation_timeout: Duration::from_secs(10),
        }
    }
}

impl LdapConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn base_dn(mut self, dn: impl Into<String>) -> Self {
        self.base_dn = dn.into();
        self
    }

    pub fn user_search_filter(mut self, filter: impl Into<String>) -> Self {
        self.user_search_filter = filter.into();
        self
    }

    pub fn user_dn_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.user_dn_pattern = Some(pattern.into());
        self
    }

    pub fn bind_dn(mut self, dn: impl Into<String>) -> Self {
        self.bind_dn = Some(dn.into());
        self
    }

    pub fn bind_password(mut self, password: impl Into<String>) -> Self {
        self.bind_password = Some(password.into());
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::Missing { name: "url".into() });
        }
        if self.user_dn_pattern.is_none() && self.base_dn.is_empty() {
            return Err(ConfigError::Invalid {
                name: "base_dn".into(),
                message: "either base_dn or user_dn_pattern is required".into(),
            });
        }
        if self.bind_dn.is_some() != self.bind_password.is_some() {
            return Err(ConfigError::Invalid {
                name: "bind_dn".into(),
                message: "bind_dn and bind_password must be set together".into(),
            });
        }
        Ok(())
    }

    /// Search filter with the username substituted.
    pub fn build_user_filter(&self, username: &str) -> String {
        self.user_search_filter
            .replace("{0}", &escape_filter_value(username))
    }

    /// Direct-bind DN with the username substituted.
    pub fn build_user_dn(&self, username: &str) -> Option<String> {
        self.user_dn_pattern
            .as_ref()
            .map(|pattern| pattern.replace("{0}", &escape_dn_value(username)))
    }
}

/// RFC 4514 escaping for attribute values placed in a DN.
fn escape_dn_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '#' if i == 0 => escaped.push_str("\\#"),
            ' ' if i == 0 || i == last => escaped.push_str("\\ "),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// RFC 4515 escaping for assertion values.
fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Directory operation failures.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum LdapError {
    #[display("LDAP connection failed: {message}")]
    ConnectionFailed { message: String },
    #[display("Invalid credentials")]
    InvalidCredentials,
    #[display("LDAP search failed: {message}")]
    SearchFailed { message: String },
    #[display("LDAP operation timed out")]
    Timeout,
}

/// Directory operations used by the validator.
#[async_trait]
pub trait LdapOperations: Send + Sync {
    /// Bind as `dn`.
    async fn bind(&self, dn: &str, password: &str) -> Result<(), LdapError>;

    /// DNs of the entries under `base` matching `filter`.
    async fn search(&self, base: &str, filter: &str) -> Result<Vec<String>, LdapError>;
}

struct DirectoryEntry {
    uid: String,
    password: String,
}

/// Directory held in memory. Filters of the form `(attr=value)` match on uid.
#[derive(Default)]
pub struct InMemoryDirectory {
    entries: HashMap<String, DirectoryEntry>,
    service_accounts: HashMap<String, String>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(
        mut self,
        dn: impl Into<String>,
        uid: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.entries.insert(
            dn.into(),
            DirectoryEntry {
                uid: uid.into(),
                password: password.into(),
            },
        );
        self
    }

    pub fn service_account(mut self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.service_accounts.insert(dn.into(), password.into());
        self
    }
}

#[async_trait]
impl LdapOperations for InMemoryDirectory {
    async fn bind(&self, dn: &str, password: &str) -> Result<(), LdapError> {
        let stored = self
            .entries
            .get(dn)
            .map(|e| e.password.as_str())
            .or_else(|| self.service_accounts.get(dn).map(String::as_str));
        match stored {
            Some(stored) if stored == password => Ok(()),
            _ => Err(LdapError::InvalidCredentials),
        }
    }

    async fn search(&self, base: &str, filter: &str) -> Result<Vec<String>, LdapError> {
        let value = filter
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split_once('=')
            .map(|(_, v)| v)
            .ok_or_else(|| LdapError::SearchFailed {
                message: format!("unsupported filter {}", filter),
            })?;
        let base = base.to_lowercase();
        let mut found: Vec<String> = self
            .entries
            .iter()
            .filter(|(dn, entry)| entry.uid == value && dn.to_lowercase().ends_with(&base))
            .map(|(dn, _)| dn.clone())
            .collect();
        found.sort();
        Ok(found)
    }
}

/// Validates a username and password by binding to a directory.
pub struct LdapCredentialValidator {
    id: String,
    config: LdapConfig,
    directory: Arc<dyn LdapOperations>,
}

impl LdapCredentialValidator {
    pub fn new(
        id: impl Into<String>,
        config: LdapConfig,
        directory: Arc<dyn LdapOperations>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            id: id.into(),
            config,
            directory,
        })
    }

    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    async fn resolve_dn(&self, username: &str) -> Result<String, CredentialError> {
        if let Some(dn) = self.config.build_user_dn(username) {
            return Ok(dn);
        }
        if let (Some(bind_dn), Some(bind_password)) =
            (&self.config.bind_dn, &self.config.bind_password)
        {
            self.directory
                .bind(bind_dn, bind_password)
                .await
                .map_err(directory_error)?;
        }
        let filter = self.config.build_user_filter(username);
        let found = self
            .directory
            .search(&self.config.base_dn, &filter)
            .await
            .map_err(directory_error)?;
        match found.as_slice() {
            [dn] => Ok(dn.clone()),
            [] => Err(CredentialError::Directory {
                message: "No such user".into(),
            }),
            _ => Err(CredentialError::Directory {
                message: format!("Multiple entries found for {}", username),
            }),
        }
    }
}

fn directory_error(error: LdapError) -> CredentialError {
    CredentialError::Directory {
        message: error.to_string(),
    }
}

#[async_trait]
impl CredentialValidator for LdapCredentialValidator {
    fn id(&self) -> &str {
        &self.id
    }

    async fn validate(
        &self,
        context: &AuthenticationContext,
        _warnings: &mut Warnings,
    ) -> Result<Option<Subject>, CredentialError> {
        let Some(up) = &context.username_password else {
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
            .filter(|p| !p.is_empty())
            .ok_or_else(|| CredentialError::login("No password available"))?;

        let dn = self.resolve_dn(username).await?;
        debug!("{}: binding as {}", self.id, dn);

        let bind = tokio::time::timeout(
            self.config.operation_timeout,
            self.directory.bind(&dn, password),
        )
        .await
        .unwrap_or(Err(LdapError::Timeout));
        if let Err(e) = bind {
            warn!("{}: bind for {} failed: {}", self.id, username, e);
            return Err(directory_error(e));
        }

        Ok(Some(
            Subject::new()
                .principal(Principal::username(username))
                .principal(Principal::X500(dn)),
        ))
    }
}
