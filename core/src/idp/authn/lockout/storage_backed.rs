//! Lockout manager backed by a [`StorageService`].
//!
//! Each key maps to a record holding the failure count and the time of the
//! last failure. Increments read the record and write it back with the
//! version they read, retrying on conflict, so concurrent failures for the
//! same key are all counted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::idp::authn::context::AuthenticationContext;
use crate::idp::authn::lockout::{
    AccountKeyStrategy, AccountLockoutManager, EnumeratableAccountLockoutManager,
};
use crate::idp::authn::storage::StorageService;
use crate::idp::error::{ConfigError, StorageError};

/// Lockout policy.
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// Failures before the key is locked
    pub max_attempts: u32,
    /// A counter untouched for this long starts over
    pub counter_interval: Duration,
    /// How long a key stays locked; zero means until cleared
    pub lockout_duration: Duration,
    /// Storage context holding the counters
    pub storage_context: String,
    /// Account key derivation
    pub key_strategy: AccountKeyStrategy,
    /// Attempts at a conflicting versioned update before giving up
    pub max_update_retries: u32,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            counter_interval: Duration::from_secs(5 * 60),
            lockout_duration: Duration::from_secs(5 * 60),
            storage_context: "_account_lockout".to_string(),
            key_strategy: AccountKeyStrategy::default(),
            max_update_retries: 10,
        }
    }
}

impl LockoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn counter_interval(mut self, interval: Duration) -> Self {
        self.counter_interval = interval;
        self
    }

    pub fn lockout_duration(mut self, duration: Duration) -> Self {
        self.lockout_duration = duration;
        self
    }

    pub fn storage_context(mut self, context: impl Into<String>) -> Self {
        self.storage_context = context.into();
        self
    }

    pub fn key_strategy(mut self, strategy: AccountKeyStrategy) -> Self {
        self.key_strategy = strategy;
        self
    }

    pub fn max_update_retries(mut self, retries: u32) -> Self {
        self.max_update_retries = retries;
        self
    }

    /// Few attempts, long lockout.
    pub fn strict() -> Self {
        Self::new()
            .max_attempts(3)
            .counter_interval(Duration::from_secs(30 * 60))
            .lockout_duration(Duration::from_secs(30 * 60))
    }

    /// Many attempts, short lockout.
    pub fn lenient() -> Self {
        Self::new()
            .max_attempts(10)
            .counter_interval(Duration::from_secs(60))
            .lockout_duration(Duration::from_secs(60))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "max_attempts".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.storage_context.is_empty() {
            return Err(ConfigError::Missing {
                name: "storage_context".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockoutRecord {
    count: u32,
    last_failure: DateTime<Utc>,
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100))
}

/// Storage-backed lockout manager.
#[derive(Clone)]
pub struct StorageBackedAccountLockoutManager {
    storage: Arc<dyn StorageService>,
    config: LockoutConfig,
}

impl StorageBackedAccountLockoutManager {
    pub fn new(storage: Arc<dyn StorageService>, config: LockoutConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Current failure count for a key.
    pub async fn attempts(&self, key: &str) -> Result<u32, StorageError> {
        Ok(self
            .read_record(key)
            .await?
            .map(|(record, _)| record.count)
            .unwrap_or(0))
    }

    async fn read_record(&self, key: &str) -> Result<Option<(LockoutRecord, u64)>, StorageError> {
        let Some(stored) = self.storage.read(&self.config.storage_context, key).await? else {
            return Ok(None);
        };
        let record: LockoutRecord =
            serde_json::from_str(&stored.value).map_err(|e| StorageError::Serialization {
                message: e.to_string(),
            })?;
        Ok(Some((record, stored.version)))
    }

    fn is_locked(&self, record: &LockoutRecord, now: DateTime<Utc>) -> bool {
        if record.count < self.config.max_attempts {
            return false;
        }
        self.config.lockout_duration.is_zero()
            || now - record.last_failure < to_chrono(self.config.lockout_duration)
    }

    fn expiration(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.config.lockout_duration.is_zero() {
            return None;
        }
        let keep = self.config.counter_interval.max(self.config.lockout_duration);
        now.checked_add_signed(to_chrono(keep))
    }

    fn next_record(&self, current: Option<&LockoutRecord>, now: DateTime<Utc>) -> LockoutRecord {
        let count = match current {
            Some(record)
                if self.is_locked(record, now)
                    || now - record.last_failure <= to_chrono(self.config.counter_interval) =>
            {
                record.count.saturating_add(1)
            }
            _ => 1,
        };
        LockoutRecord {
            count,
            last_failure: now,
        }
    }

    async fn try_increment(&self, key: &str) -> Result<bool, StorageError> {
        let context = &self.config.storage_context;
        for _ in 0..self.config.max_update_retries {
            let now = Utc::now();
            let current = self.read_record(key).await?;
            let next = self.next_record(current.as_ref().map(|(r, _)| r), now);
            let value = serde_json::to_string(&next).map_err(|e| StorageError::Serialization {
                message: e.to_string(),
            })?;

            let stored = match current {
                None => {
                    self.storage
                        .create(context, key, value, self.expiration(now))
                        .await?
                }
                Some((_, version)) => match self
                    .storage
                    .update_with_version(version, context, key, value, self.expiration(now))
                    .await
                {
                    Ok(new_version) => new_version.is_some(),
                    Err(StorageError::VersionMismatch { .. }) => false,
                    Err(e) => return Err(e),
                },
            };

            if stored {
                debug!("Account lockout counter for {} is now {}", key, next.count);
                return Ok(true);
            }
            debug!("Concurrent update of lockout record {}, retrying", key);
        }
        Ok(false)
    }
}

#[async_trait]
impl AccountLockoutManager for StorageBackedAccountLockoutManager {
    fn account_key(&self, context: &AuthenticationContext) -> Option<String> {
        self.config.key_strategy.derive(context)
    }

    async fn check_key(&self, key: &str) -> bool {
        match self.read_record(key).await {
            Ok(Some((record, _))) => self.is_locked(&record, Utc::now()),
            Ok(None) => false,
            Err(e) => {
                warn!("Error reading lockout record for {}: {}", key, e);
                false
            }
        }
    }

    async fn increment_key(&self, key: &str) -> bool {
        match self.try_increment(key).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(
                    "Gave up incrementing lockout counter for {} after {} conflicting updates",
                    key, self.config.max_update_retries
                );
                false
            }
            Err(e) => {
                warn!("Error incrementing lockout counter for {}: {}", key, e);
                false
            }
        }
    }

    async fn clear_key(&self, key: &str) -> bool {
        match self.storage.delete(&self.config.storage_context, key).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Error clearing lockout record for {}: {}", key, e);
                false
            }
        }
    }

    fn as_enumeratable(&self) -> Option<&dyn EnumeratableAccountLockoutManager> {
        Some(self)
    }
}

#[async_trait]
impl EnumeratableAccountLockoutManager for StorageBackedAccountLockoutManager {
    async fn enumerate(&self, partial_key: &str) -> Vec<String> {
        let prefix = partial_key.to_lowercase();
        let keys = match self.storage.keys(&self.config.storage_context).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Error listing lockout records: {}", e);
                return Vec::new();
            }
        };

        let mut locked = Vec::new();
        for key in keys.into_iter().filter(|k| k.starts_with(&prefix)) {
            if self.check_key(&key).await {
                locked.push(key);
            }
        }
        locked
    }
}
