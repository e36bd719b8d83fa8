//! Lockout administration API tests.
//!
//! Drives the actix routes end to end against in-memory lockout managers.


use std::sync::Arc;

use actix_web::http::{header, Method, StatusCode};
use actix_web::{test, web, App};
use async_trait::async_trait;
use serde_json::{json, Value};

use common::*;
use idp_authn_core::idp::admin::{configure, LockoutAdminState};
use idp_authn_core::idp::authn::{AccountLockoutManager, AuthenticationContext, LockoutConfig};

const KEY: &str = "jdoe!192.0.2.1";

/// A manager without enumeration whose updates always fail.
struct ReadOnlyLockout;

#[async_trait]
impl AccountLockoutManager for ReadOnlyLockout {
    fn account_key(&self, context: &AuthenticationContext) -> Option<String> {
        context.username().map(str::to_string)
    }

    async fn check_key(&self, _key: &str) -> bool {
        false
    }

    async fn increment_key(&self, _key: &str) -> bool {
        false
    }

    async fn clear_key(&self, _key: &str) -> bool {
        false
    }
}

fn state() -> LockoutAdminState {
    let password: Arc<dyn AccountLockoutManager> =
        lockout_manager(LockoutConfig::new().max_attempts(2));
    LockoutAdminState::new()
        .manager("password", password)
        .manager("readonly", Arc::new(ReadOnlyLockout))
}

macro_rules! app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .service(web::scope("/lockout").configure(configure)),
        )
        .await
    };
}

fn uri(manager: &str, key: &str) -> String {
    format!("/lockout/{}/{}", manager, key)
}

#[actix_web::test]
async fn test_check_unlocked_key() {
    let app = app!();

    let req = test::TestRequest::get().uri(&uri("password", KEY)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(
        body,
        json!({
            "data": {
                "type": "lockout-records",
                "id": KEY,
                "attributes": { "lockout": false }
            }
        })
    );
}

#[actix_web::test]
async fn test_increment_then_clear() {
    let app = app!();

    for _ in 0..2 {
        let req = test::TestRequest::post().uri(&uri("password", KEY)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    let req = test::TestRequest::get().uri(&uri("password", KEY)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["attributes"]["lockout"], json!(true));

    let req = test::TestRequest::delete().uri(&uri("password", KEY)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri(&uri("password", KEY)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["attributes"]["lockout"], json!(false));
}

#[actix_web::test]
async fn test_partial_key_lookup() {
    let app = app!();

    for key in [KEY, KEY, "jdoe!198.51.100.7"] {
        let req = test::TestRequest::post().uri(&uri("password", key)).to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::get()
        .uri(&format!("{}?partial=true", uri("password", "jdoe")))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["data"]["id"], json!("jdoe"));
    assert_eq!(body["data"]["data"], json!([KEY]));
}

#[actix_web::test]
async fn test_partial_lookup_needs_enumeration() {
    let app = app!();

    let req = test::TestRequest::get()
        .uri(&format!("{}?partial=true", uri("readonly", "jdoe")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn test_failed_update_is_an_error() {
    let app = app!();

    let req = test::TestRequest::post().uri(&uri("readonly", KEY)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let req = test::TestRequest::delete().uri(&uri("readonly", KEY)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn test_unknown_manager() {
    let app = app!();

    let req = test::TestRequest::get().uri(&uri("nope", KEY)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        resp.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/json")
    );

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"][0]["status"], json!("404"));
    assert_eq!(body["errors"][0]["detail"], json!("Invalid lockout manager: nope"));
}

#[actix_web::test]
async fn test_missing_key() {
    let app = app!();

    let req = test::TestRequest::get().uri("/lockout/password").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"][0]["detail"], json!("No account lockout key specified"));
}

#[actix_web::test]
async fn test_unsupported_method() {
    let app = app!();

    let req = test::TestRequest::default()
        .method(Method::PUT)
        .uri(&uri("password", KEY))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[actix_web::test]
async fn test_unsupported_method_without_key() {
    let app = app!();

    let req = test::TestRequest::default()
        .method(Method::PUT)
        .uri("/lockout/password")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"][0]["status"], json!("405"));
}

#[actix_web::test]
async fn test_malformed_query() {
    let app = app!();

    let req = test::TestRequest::get()
        .uri(&format!("{}?partial=yes", uri("password", KEY)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/json")
    );

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"][0]["status"], json!("400"));
}
