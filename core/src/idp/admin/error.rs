use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use derive_more::{Display, Error};
use serde_json::json;

/// Failures of the lockout administration API.
#[derive(Debug, Display, Error)]
pub enum LockoutApiError {
    /// No manager is registered under the id.
    #[display("Invalid lockout manager: {id}")]
    UnknownManager { id: String },

    /// The request named no account key.
    #[display("No account lockout key specified")]
    MissingKey,

    /// The query string could not be parsed.
    #[display("Invalid query: {message}")]
    InvalidQuery { message: String },

    /// Only GET, POST and DELETE are supported.
    #[display("Method not allowed")]
    MethodNotAllowed,

    /// Partial key lookup on a manager that cannot enumerate.
    #[display("Lockout manager {id} does not support partial key lookup")]
    NotEnumeratable { id: String },

    /// The manager reported the increment or clear as failed.
    #[display("Lockout manager {id} failed to update {key}")]
    OperationFailed { id: String, key: String },
}

impl ResponseError for LockoutApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            LockoutApiError::UnknownManager { .. } | LockoutApiError::MissingKey => {
                StatusCode::NOT_FOUND
            }
            LockoutApiError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            LockoutApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            LockoutApiError::NotEnumeratable { .. } | LockoutApiError::OperationFailed { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "errors": [{
                "status": status.as_u16().to_string(),
                "title": status.canonical_reason().unwrap_or("Error"),
                "detail": self.to_string(),
            }]
        });

        HttpResponse::build(status)
            .content_type("application/json")
            .body(body.to_string())
    }
}
