//! JSON error responses shared by the HTTP services
//!
//! Validation and not-found errors surface as user-visible messages; a lost
//! compare-and-swap race maps to 409 so the caller can resubmit. No error in
//! this core is fatal to the process.

use crate::Error;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::error;

/// Error body returned by every endpoint on failure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: String,
}

/// Handler error type: status code plus JSON body
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a core error to an HTTP response
pub fn error_response(err: Error) -> ApiError {
    let code = match &err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::StaleWrite(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if code == StatusCode::INTERNAL_SERVER_ERROR {
        error!("request failed: {}", err);
    }

    (
        code,
        Json(ErrorResponse {
            status: format!("error: {}", err),
        }),
    )
}

/// 401 for missing or unknown session tokens
pub fn unauthorized() -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            status: "error: login required".to_string(),
        }),
    )
}

/// 403 for non-admin access to committee reports
pub fn forbidden() -> ApiError {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorResponse {
            status: "error: admin access required".to_string(),
        }),
    )
}
