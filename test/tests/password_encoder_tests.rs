//! Password Encoder tests.
//!
//! Tests for Argon2 and the login module that stores its hashes.

use std::sync::Arc;

use idp_authn_core::idp::authn::{
    Argon2PasswordEncoder, ControlFlag, InMemoryLoginModule, LoginConfiguration, PasswordEncoder,
    Principal,
};
use idp_authn_core::idp::error::CredentialError;

#[test]
fn test_password_hashes_are_different() {
    let encoder = Argon2PasswordEncoder::new();
    let password = "same_password";

    let hash1 = encoder.encode(password).unwrap();
    let hash2 = encoder.encode(password).unwrap();

    // Different salts should produce different hashes
    assert_ne!(hash1, hash2);

    // Both should still verify
    assert!(encoder.matches(password, &hash1));
    assert!(encoder.matches(password, &hash2));
}

#[tokio::test]
async fn test_login_module_with_hashed_passwords() {
    let module = InMemoryLoginModule::new(Arc::new(Argon2PasswordEncoder::new()))
        .user("jdoe", "changeit")
        .unwrap();
    let config = LoginConfiguration::new().entry("ShibUserPassAuth", Arc::new(module), ControlFlag::Required);

    assert_eq!(
        config.login("ShibUserPassAuth", "jdoe", "changeit").await.unwrap(),
        vec![Principal::username("jdoe")]
    );
    assert_eq!(
        config.login("ShibUserPassAuth", "jdoe", "bar").await.unwrap_err(),
        CredentialError::login("Invalid password")
    );
}
