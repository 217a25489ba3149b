//! Error taxonomy for the request path.
//!
//! Resolution errors (unknown/disabled/expired tenant) are fatal to the
//! request and short-circuit before any handler runs. Rate-limit errors are
//! recoverable by the caller once the window elapses and carry their own
//! variant so clients can tell them apart. Audit pipeline faults never appear
//! here: they are contained inside the pipeline and only logged.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Request-fatal errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("tenant not found: {code}")]
    TenantNotFound { code: String },
    #[error("tenant is disabled: {code}")]
    TenantDisabled { code: String },
    #[error("tenant service has expired: {code}")]
    TenantExpired { code: String },
    #[error("unauthorized")]
    Unauthorized,
    #[error("too many requests for {operation}")]
    RateLimited { operation: &'static str },
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::TenantNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::TenantDisabled { .. } | AppError::TenantExpired { .. } => {
                StatusCode::FORBIDDEN
            }
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body returned to clients.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the logs, not in the response body.
        let message = if matches!(self, AppError::Internal(_)) {
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorBody {
            code: status.as_u16(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
