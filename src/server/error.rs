//! HTTP mapping of request errors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::errors::{ProxyError, StorageError};

impl ProxyError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::UpstreamError { .. } => "upstream_error",
            Self::Storage(_) => "storage_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamError { status } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Storage(e) => match e {
                StorageError::InvalidProject { .. } | StorageError::InvalidFilename { .. } => {
                    StatusCode::BAD_REQUEST
                }
                StorageError::ProjectNotFound { .. } | StorageError::ArtifactNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        } else {
            tracing::debug!(code = self.code(), "{}", self);
        }
        (status, format!("{}\n", self)).into_response()
    }
}

/// Result type for HTTP handlers.
pub type HandlerResult<T> = Result<T, ProxyError>;
