use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use ingest::IngestError;
use thiserror::Error;
use tracing::error;

use crate::auth::AuthError;
use crate::schemas::ErrorResponse;

/// Errors returned by the HTTP handlers, rendered as [`ErrorResponse`].
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidPayload(String),

    #[error("{0}")]
    InvalidClassification(String),

    #[error("Unknown resource '{0}'")]
    UnknownResource(String),

    #[error("Invalid token: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("Database error occurred")]
    Database(#[from] IngestError),

    /// Failure while applying a webhook; the cause is echoed in `details`.
    #[error("Failed to process webhook")]
    Webhook(#[source] IngestError),

    #[error("Server-side imports are not configured")]
    ImportUnavailable,

    #[error("Import run failed: {0}")]
    ImportAborted(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) | ApiError::InvalidClassification(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::UnknownResource(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Database(_)
            | ApiError::Webhook(_)
            | ApiError::ImportUnavailable
            | ApiError::ImportAborted(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::InvalidClassification(_) => "INVALID_CLASSIFICATION",
            ApiError::UnknownResource(_) => "UNKNOWN_RESOURCE",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Database(_) | ApiError::Webhook(_) => "DATABASE_ERROR",
            ApiError::ImportUnavailable | ApiError::ImportAborted(_) => "IMPORT_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            ApiError::Webhook(source) => Some(source.to_string()),
            _ => None,
        };
        if status.is_server_error() {
            match &self {
                ApiError::Database(source) | ApiError::Webhook(source) => {
                    error!("{}: {}", self, source)
                }
                _ => error!("{}", self),
            }
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
            success: false,
            details,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_code_mapping() {
        let cases = [
            (ApiError::InvalidPayload("x".into()), StatusCode::BAD_REQUEST, "INVALID_PAYLOAD"),
            (ApiError::Unauthorized(AuthError::MissingToken), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (ApiError::UnknownResource("y".into()), StatusCode::NOT_FOUND, "UNKNOWN_RESOURCE"),
            (ApiError::ImportUnavailable, StatusCode::INTERNAL_SERVER_ERROR, "IMPORT_ERROR"),
            (ApiError::ImportAborted("panicked".into()), StatusCode::INTERNAL_SERVER_ERROR, "IMPORT_ERROR"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_database_errors_hide_the_cause() {
        let err = ApiError::Database(IngestError::Normalize("secret detail".into()));
        assert_eq!(err.to_string(), "Database error occurred");
    }
}
