//! Account lockout.
//!
//! An [`AccountLockoutManager`] tracks failed attempts per account key. The
//! key is derived from the request by a configurable [`AccountKeyStrategy`].
//! Storage failures never abort an authentication flow: they surface as
//! `false` from the mutating operations and are logged.
//!
//! # Example
//!
//! ```ignore
//! use idp_authn_core::idp::authn::lockout::{LockoutConfig, StorageBackedAccountLockoutManager};
//!
//! let manager = StorageBackedAccountLockoutManager::new(
//!     Arc::new(InMemoryStorageService::new()),
//!     LockoutConfig::new()
//!         .max_attempts(5)
//!         .lockout_duration(Duration::from_secs(300)),
//! );
//!
//! if manager.check(&ctx).await {
//!     return Event::AccountLocked;
//! }
//! ```

mod storage_backed;

pub use storage_backed::{LockoutConfig, StorageBackedAccountLockoutManager};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::idp::authn::context::AuthenticationContext;

type KeyFn = dyn Fn(&AuthenticationContext) -> Option<String> + Send + Sync;

/// How the account key is derived from a request.
#[derive(Clone, Default)]
pub enum AccountKeyStrategy {
    /// Lowercased username, `!`, client address.
    #[default]
    UsernameAndAddress,
    /// Lowercased username only.
    UsernameOnly,
    /// Caller-supplied derivation.
    Custom(Arc<KeyFn>),
}

impl AccountKeyStrategy {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&AuthenticationContext) -> Option<String> + Send + Sync + 'static,
    {
        AccountKeyStrategy::Custom(Arc::new(f))
    }

    /// Derive the key. `None` when the request lacks the needed parts.
    pub fn derive(&self, context: &AuthenticationContext) -> Option<String> {
        let username = context.username().filter(|u| !u.is_empty());
        match self {
            AccountKeyStrategy::UsernameAndAddress => {
                let address = context.client_address.as_deref()?;
                Some(format!("{}!{}", username?.to_lowercase(), address))
            }
            AccountKeyStrategy::UsernameOnly => username.map(str::to_lowercase),
            AccountKeyStrategy::Custom(f) => f(context),
        }
    }
}

impl fmt::Debug for AccountKeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountKeyStrategy::UsernameAndAddress => f.write_str("UsernameAndAddress"),
            AccountKeyStrategy::UsernameOnly => f.write_str("UsernameOnly"),
            AccountKeyStrategy::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Lockout enforcement.
///
/// `check` must have no side effects. `increment` and `clear` return whether
/// the change was stored.
#[async_trait]
pub trait AccountLockoutManager: Send + Sync {
    /// Derive the account key for a request.
    fn account_key(&self, context: &AuthenticationContext) -> Option<String>;

    /// Whether the key is currently locked.
    async fn check_key(&self, key: &str) -> bool;

    /// Record a failed attempt for the key.
    async fn increment_key(&self, key: &str) -> bool;

    /// Reset the key.
    async fn clear_key(&self, key: &str) -> bool;

    async fn check(&self, context: &AuthenticationContext) -> bool {
        match self.account_key(context) {
            Some(key) => self.check_key(&key).await,
            None => false,
        }
    }

    async fn increment(&self, context: &AuthenticationContext) -> bool {
        match self.account_key(context) {
            Some(key) => self.increment_key(&key).await,
            None => false,
        }
    }

    async fn clear(&self, context: &AuthenticationContext) -> bool {
        match self.account_key(context) {
            Some(key) => self.clear_key(&key).await,
            None => false,
        }
    }

    /// The enumeration capability, if supported.
    fn as_enumeratable(&self) -> Option<&dyn EnumeratableAccountLockoutManager> {
        None
    }
}

/// Lockout manager that can list locked keys related to a partial key.
#[async_trait]
pub trait EnumeratableAccountLockoutManager: AccountLockoutManager {
    async fn enumerate(&self, partial_key: &str) -> Vec<String>;
}
