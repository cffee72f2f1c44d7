use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use onlystars_core::types::{GateErrorBody, GateErrorCode};

/// Error response used by the gate APIs.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    status: StatusCode,
    error: GateErrorBody,
}

impl ErrorResponse {
    #[must_use]
    pub const fn new(code: GateErrorCode, message: String, status: StatusCode) -> Self {
        Self {
            status,
            error: GateErrorBody::new(code, message),
        }
    }

    #[must_use]
    pub const fn bad_request(message: String) -> Self {
        Self::new(GateErrorCode::BadRequest, message, StatusCode::BAD_REQUEST)
    }

    #[must_use]
    pub fn rate_limited() -> Self {
        Self::new(
            GateErrorCode::RateLimited,
            "Slow down".to_string(),
            StatusCode::TOO_MANY_REQUESTS,
        )
    }

    #[must_use]
    pub fn storage_unavailable() -> Self {
        Self::new(
            GateErrorCode::StorageUnavailable,
            "Nonce storage is unavailable. Please try again.".to_string(),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }

    #[must_use]
    pub fn ledger_unavailable() -> Self {
        Self::new(
            GateErrorCode::LedgerUnavailable,
            "Creator hub is unavailable. Please try again.".to_string(),
            StatusCode::SERVICE_UNAVAILABLE,
        )
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(
            GateErrorCode::NotFound,
            "Not found.".to_string(),
            StatusCode::NOT_FOUND,
        )
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Error Code: `{}`. Message: {}",
            self.error.code, self.error.error,
        )
    }
}

impl std::error::Error for ErrorResponse {}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}
