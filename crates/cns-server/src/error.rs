use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cns_service::ServiceError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object service setup failed: {0}")]
    Setup(#[source] ServiceError),

    #[error("object service teardown failed: {0}")]
    Teardown(#[source] ServiceError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// An HTTP error answer: a status code and a fixed machine-readable code.
///
/// Internal error detail is logged, never sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
}

impl ApiError {
    pub const BAD_REQUEST: Self = Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST");

    pub const fn new(status: StatusCode, code: &'static str) -> Self {
        Self { status, code }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let api = match &err {
            ServiceError::Validation(_) => Self::BAD_REQUEST,
            ServiceError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND"),
            ServiceError::Storage(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            ServiceError::Encryption(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "ENCRYPTION_ERROR"),
            ServiceError::Decryption(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "DECRYPTION_ERROR"),
            ServiceError::Log { .. } => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "LOG_ERROR"),
            ServiceError::Cancelled => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "CANCELLED"),
            ServiceError::Config(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ServiceError::NotReady => Self::new(StatusCode::SERVICE_UNAVAILABLE, "NOT_READY"),
            ServiceError::Closed => Self::new(StatusCode::SERVICE_UNAVAILABLE, "SHUTTING_DOWN"),
        };
        if api.status.is_server_error() {
            tracing::error!(error = %err, code = api.code, "request failed");
        } else {
            tracing::debug!(error = %err, code = api.code, "request rejected");
        }
        api
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.code }))).into_response()
    }
}
