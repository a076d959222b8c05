use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, services::validation::ValidationFailure};

/// Failures returned by the service layer before any HTTP mapping.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A storage call failed underneath a read or write.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// No store is installed; the supervisor has not (re)connected yet.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The caller did not present a usable identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The submitted data broke one of the prediction rules.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Tournament or group unknown to the store.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

/// Errors rendered as HTTP responses with a JSON `{message}` body.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or rule-breaking input on a read path.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or unusable caller identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Unknown tournament or group.
    #[error("not found: {0}")]
    NotFound(String),
    /// The prediction store cannot be reached.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Read paths surface rule violations as HTTP errors instead of the save
/// envelope.
impl From<ValidationFailure> for ServiceError {
    fn from(failure: ValidationFailure) -> Self {
        match failure {
            ValidationFailure::Unauthorized => ServiceError::Unauthorized(failure.to_string()),
            ValidationFailure::TournamentNotFound { .. } => {
                ServiceError::NotFound(failure.to_string())
            }
            other => ServiceError::InvalidInput(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
