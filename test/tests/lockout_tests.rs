//! Account lockout tests.
//!
//! Policy thresholds, expiry, key derivation, enumeration and concurrent
//! increments against the storage-backed manager.


use std::sync::Arc;
use std::time::Duration;

use common::*;
use futures::future::join_all;
use idp_authn_core::idp::authn::{
    AccountKeyStrategy, AccountLockoutManager, AuthenticationContext, InMemoryStorageService,
    LockoutConfig, StorageBackedAccountLockoutManager,
};

#[tokio::test]
async fn test_locks_at_threshold() {
    let manager = lockout_manager(LockoutConfig::new().max_attempts(3));

    for _ in 0..2 {
        assert!(manager.increment_key("jdoe!192.0.2.1").await);
        assert!(!manager.check_key("jdoe!192.0.2.1").await);
    }
    assert!(manager.increment_key("jdoe!192.0.2.1").await);
    assert!(manager.check_key("jdoe!192.0.2.1").await);
    assert_eq!(manager.attempts("jdoe!192.0.2.1").await.unwrap(), 3);

    assert!(manager.clear_key("jdoe!192.0.2.1").await);
    assert!(!manager.check_key("jdoe!192.0.2.1").await);
    // Clearing an absent key still succeeds
    assert!(manager.clear_key("jdoe!192.0.2.1").await);
}

#[tokio::test]
async fn test_lockout_expires() {
    let manager = lockout_manager(
        LockoutConfig::new()
            .max_attempts(1)
            .counter_interval(Duration::from_millis(50))
            .lockout_duration(Duration::from_millis(50)),
    );

    assert!(manager.increment_key("jdoe").await);
    assert!(manager.check_key("jdoe").await);

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(!manager.check_key("jdoe").await);
}

#[tokio::test]
async fn test_zero_duration_locks_until_cleared() {
    let manager = lockout_manager(
        LockoutConfig::new()
            .max_attempts(1)
            .lockout_duration(Duration::ZERO),
    );

    assert!(manager.increment_key("jdoe").await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(manager.check_key("jdoe").await);
    assert!(manager.clear_key("jdoe").await);
    assert!(!manager.check_key("jdoe").await);
}

#[tokio::test]
async fn test_key_derivation() {
    let ctx = login_context("JDoe", "pw");

    let manager = lockout_manager(LockoutConfig::new());
    assert_eq!(manager.account_key(&ctx).as_deref(), Some("jdoe!192.0.2.1"));

    let manager = lockout_manager(LockoutConfig::new().key_strategy(AccountKeyStrategy::UsernameOnly));
    assert_eq!(manager.account_key(&ctx).as_deref(), Some("jdoe"));

    let manager = lockout_manager(LockoutConfig::new().key_strategy(AccountKeyStrategy::custom(
        |ctx: &AuthenticationContext| ctx.client_address.clone(),
    )));
    assert_eq!(manager.account_key(&ctx).as_deref(), Some(CLIENT_ADDRESS));
}

#[tokio::test]
async fn test_missing_key_is_never_locked() {
    let manager = lockout_manager(LockoutConfig::new().max_attempts(1));
    let ctx = AuthenticationContext::new().client_address(CLIENT_ADDRESS);

    assert_eq!(manager.account_key(&ctx), None);
    assert!(!manager.increment(&ctx).await);
    assert!(!manager.check(&ctx).await);
    assert!(!manager.clear(&ctx).await);
}

#[tokio::test]
async fn test_enumerate_locked_keys() {
    let manager = lockout_manager(LockoutConfig::new().max_attempts(2));
    for key in ["jdoe!192.0.2.1", "jdoe!192.0.2.1", "jdoe!198.51.100.7", "alice!192.0.2.1", "alice!192.0.2.1"] {
        manager.increment_key(key).await;
    }

    let enumeratable = manager.as_enumeratable().unwrap();
    let mut locked = enumeratable.enumerate("JDOE").await;
    locked.sort();
    assert_eq!(locked, vec!["jdoe!192.0.2.1"]);

    assert_eq!(enumeratable.enumerate("bob").await, Vec::<String>::new());
}

#[tokio::test]
async fn test_concurrent_increments_are_all_counted() {
    let storage = Arc::new(InMemoryStorageService::new());
    let manager = Arc::new(StorageBackedAccountLockoutManager::new(
        storage,
        LockoutConfig::new()
            .max_attempts(1000)
            .max_update_retries(1000),
    ));

    let tasks = (0..50).map(|_| {
        let manager = manager.clone();
        tokio::spawn(async move { manager.increment_key("jdoe!192.0.2.1").await })
    });
    let results = join_all(tasks).await;

    assert!(results.into_iter().all(|r| r.unwrap()));
    assert_eq!(manager.attempts("jdoe!192.0.2.1").await.unwrap(), 50);
}

#[test]
fn test_policy_presets() {
    assert!(LockoutConfig::strict().validate().is_ok());
    assert!(LockoutConfig::lenient().validate().is_ok());
    assert!(LockoutConfig::strict().max_attempts < LockoutConfig::lenient().max_attempts);
    assert!(LockoutConfig::new().max_attempts(0).validate().is_err());
    assert!(LockoutConfig::new().storage_context("").validate().is_err());
}
