//! Versioned key/value storage for lockout counters and tickets.
//!
//! Records live in named contexts and carry a version that increases on every
//! update. Writers that read, modify and write back a record pass the version
//! they read to [`StorageService::update_with_version`], which fails with
//! [`StorageError::VersionMismatch`] if another writer got there first.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::idp::error::StorageError;

/// A stored value with its version and optional expiration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRecord {
    pub value: String,
    pub version: u64,
    pub expiration: Option<DateTime<Utc>>,
}

impl StorageRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.map(|exp| exp <= now).unwrap_or(false)
    }
}

/// Storage backend.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Create a record. Returns `false` if a live record already exists.
    async fn create(
        &self,
        context: &str,
        key: &str,
        value: String,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<bool, StorageError>;

    /// Read a live record.
    async fn read(&self, context: &str, key: &str) -> Result<Option<StorageRecord>, StorageError>;

    /// Replace a record if its version still equals `version`.
    ///
    /// Returns the new version, or `None` if the record no longer exists.
    async fn update_with_version(
        &self,
        version: u64,
        context: &str,
        key: &str,
        value: String,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<Option<u64>, StorageError>;

    /// Delete a record. Returns whether a live record was removed.
    async fn delete(&self, context: &str, key: &str) -> Result<bool, StorageError>;

    /// Keys of the live records in a context.
    async fn keys(&self, context: &str) -> Result<Vec<String>, StorageError>;
}

type Contexts = HashMap<String, HashMap<String, StorageRecord>>;

/// In-memory storage. Expired records of a context are swept on every
/// `create` in that context, and by [`InMemoryStorageService::cleanup`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorageService {
    contexts: Arc<RwLock<Contexts>>,
}

impl InMemoryStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records in a context.
    pub async fn len(&self, context: &str) -> usize {
        let now = Utc::now();
        self.contexts
            .read()
            .await
            .get(context)
            .map(|records| records.values().filter(|r| !r.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub async fn is_empty(&self, context: &str) -> bool {
        self.len(context).await == 0
    }

    /// Drop expired records from every context. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let now = Utc::now();
        let mut contexts = self.contexts.write().await;
        let mut removed = 0;
        for records in contexts.values_mut() {
            let before = records.len();
            records.retain(|_, record| !record.is_expired(now));
            removed += before - records.len();
        }
        contexts.retain(|_, records| !records.is_empty());
        removed
    }
}

#[async_trait]
impl StorageService for InMemoryStorageService {
    async fn create(
        &self,
        context: &str,
        key: &str,
        value: String,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<bool, StorageError> {
        let now = Utc::now();
        let mut contexts = self.contexts.write().await;
        let records = contexts.entry(context.to_string()).or_default();
        records.retain(|_, record| !record.is_expired(now));

        if records.contains_key(key) {
            return Ok(false);
        }

        records.insert(
            key.to_string(),
            StorageRecord {
                value,
                version: 1,
                expiration,
            },
        );
        Ok(true)
    }

    async fn read(&self, context: &str, key: &str) -> Result<Option<StorageRecord>, StorageError> {
        let now = Utc::now();
        let contexts = self.contexts.read().await;
        Ok(contexts
            .get(context)
            .and_then(|records| records.get(key))
            .filter(|record| !record.is_expired(now))
            .cloned())
    }

    async fn update_with_version(
        &self,
        version: u64,
        context: &str,
        key: &str,
        value: String,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<Option<u64>, StorageError> {
        let now = Utc::now();
        let mut contexts = self.contexts.write().await;
        let Some(records) = contexts.get_mut(context) else {
            return Ok(None);
        };

        let expired = match records.get(key) {
            Some(record) => record.is_expired(now),
            None => return Ok(None),
        };
        if expired {
            records.remove(key);
            return Ok(None);
        }

        match records.get_mut(key) {
            Some(record) if record.version != version => Err(StorageError::VersionMismatch {
                context: context.to_string(),
                key: key.to_string(),
            }),
            Some(record) => {
                record.value = value;
                record.expiration = expiration;
                record.version += 1;
                Ok(Some(record.version))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, context: &str, key: &str) -> Result<bool, StorageError> {
        let now = Utc::now();
        let mut contexts = self.contexts.write().await;
        Ok(contexts
            .get_mut(context)
            .and_then(|records| records.remove(key))
            .map(|record| !record.is_expired(now))
            .unwrap_or(false))
    }

    async fn keys(&self, context: &str) -> Result<Vec<String>, StorageError> {
        let now = Utc::now();
        let mut contexts = self.contexts.write().await;
        let Some(records) = contexts.get_mut(context) else {
            return Ok(Vec::new());
        };
        records.retain(|_, record| !record.is_expired(now));
        let mut keys: Vec<String> = records.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
