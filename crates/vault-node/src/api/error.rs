//! Mapping of vault errors onto HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;
use vault_core::api::ErrorBody;
use vault_core::{ErrorKind, VaultError};

/// Handler error carrying a [`VaultError`].
#[derive(Debug)]
pub struct ApiError(pub VaultError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::InvalidInput | ErrorKind::InsufficientFunds | ErrorKind::NoFundsAvailable => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::PriceUnavailable | ErrorKind::CovenantUninitialized => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(VaultError::invalid(rejection.body_text()))
    }
}

/// Seconds a client should wait before repeating a request that failed on
/// a transient upstream condition.
pub const RETRY_AFTER_SECS: u64 = 5;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = %status, error = %self.0, "Request failed");
        }
        let body = Json(ErrorBody::from(&self.0));
        if status.is_server_error() && self.0.is_retryable() {
            let retry_after = [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())];
            return (status, retry_after, body).into_response();
        }
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
