//! REST administration of account lockout.
//!
//! | Method | Path | Effect |
//! |--------|------|--------|
//! | `GET` | `/{manager_id}/{key}` | lockout status of the key |
//! | `GET` | `/{manager_id}/{key}?partial=true` | locked keys starting with `key` |
//! | `POST` | `/{manager_id}/{key}` | record a failed attempt |
//! | `DELETE` | `/{manager_id}/{key}` | clear the key |
//!
//! Other methods get `405`. Failures, including malformed query strings, are
//! JSON error documents, see [`LockoutApiError`].
//!
//! # Example
//!
//! ```ignore
//! use actix_web::{web, App, HttpServer};
//! use idp_authn_core::idp::admin::{configure, LockoutAdminState};
//!
//! let state = web::Data::new(LockoutAdminState::new().manager("password", manager));
//! HttpServer::new(move || {
//!     App::new()
//!         .app_data(state.clone())
//!         .service(web::scope("/admin/lockout").configure(configure))
//! })
//! ```

mod error;

pub use error::LockoutApiError;

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::idp::authn::lockout::AccountLockoutManager;

/// Lockout managers reachable through the API, by id.
#[derive(Default, Clone)]
pub struct LockoutAdminState {
    managers: HashMap<String, Arc<dyn AccountLockoutManager>>,
}

impl LockoutAdminState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manager(mut self, id: impl Into<String>, manager: Arc<dyn AccountLockoutManager>) -> Self {
        self.managers.insert(id.into(), manager);
        self
    }

    fn lookup(&self, id: &str) -> Result<&Arc<dyn AccountLockoutManager>, LockoutApiError> {
        self.managers
            .get(id)
            .ok_or_else(|| LockoutApiError::UnknownManager { id: id.to_string() })
    }
}

#[derive(Debug, Deserialize)]
struct LockoutQuery {
    #[serde(default)]
    partial: bool,
}

/// Register the lockout routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/{manager_id}/{key}")
            .route(web::get().to(check_lockout))
            .route(web::post().to(increment_lockout))
            .route(web::delete().to(clear_lockout))
            .default_service(web::to(method_not_allowed)),
    )
    .service(
        web::resource("/{manager_id}")
            .route(web::get().to(missing_key))
            .route(web::post().to(missing_key))
            .route(web::delete().to(missing_key))
            .default_service(web::to(method_not_allowed)),
    )
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        LockoutApiError::InvalidQuery {
            message: err.to_string(),
        }
        .into()
    }));
}

fn require_key(key: &str) -> Result<(), LockoutApiError> {
    if key.trim().is_empty() {
        return Err(LockoutApiError::MissingKey);
    }
    Ok(())
}

async fn check_lockout(
    state: web::Data<LockoutAdminState>,
    path: web::Path<(String, String)>,
    query: web::Query<LockoutQuery>,
) -> Result<HttpResponse, LockoutApiError> {
    let (manager_id, key) = path.into_inner();
    let manager = state.lookup(&manager_id)?;
    require_key(&key)?;

    if query.partial {
        let enumeratable = manager
            .as_enumeratable()
            .ok_or_else(|| LockoutApiError::NotEnumeratable {
                id: manager_id.clone(),
            })?;
        let keys = enumeratable.enumerate(&key).await;
        return Ok(HttpResponse::Ok().json(json!({
            "data": {
                "type": "lockout-records",
                "id": key,
                "data": keys,
            }
        })));
    }

    let locked = manager.check_key(&key).await;
    Ok(HttpResponse::Ok().json(json!({
        "data": {
            "type": "lockout-records",
            "id": key,
            "attributes": { "lockout": locked },
        }
    })))
}

async fn increment_lockout(
    state: web::Data<LockoutAdminState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, LockoutApiError> {
    let (manager_id, key) = path.into_inner();
    let manager = state.lookup(&manager_id)?;
    require_key(&key)?;

    if !manager.increment_key(&key).await {
        return Err(LockoutApiError::OperationFailed { id: manager_id, key });
    }
    info!("Lockout counter for {} incremented via {}", key, manager_id);
    Ok(HttpResponse::NoContent().finish())
}

async fn clear_lockout(
    state: web::Data<LockoutAdminState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, LockoutApiError> {
    let (manager_id, key) = path.into_inner();
    let manager = state.lookup(&manager_id)?;
    require_key(&key)?;

    if !manager.clear_key(&key).await {
        return Err(LockoutApiError::OperationFailed { id: manager_id, key });
    }
    info!("Lockout for {} cleared via {}", key, manager_id);
    Ok(HttpResponse::NoContent().finish())
}

async fn missing_key(
    state: web::Data<LockoutAdminState>,
    path: web::Path<String>,
) -> Result<HttpResponse, LockoutApiError> {
    state.lookup(&path.into_inner())?;
    Err(LockoutApiError::MissingKey)
}

async fn method_not_allowed() -> Result<HttpResponse, LockoutApiError> {
    Err(LockoutApiError::MethodNotAllowed)
}
