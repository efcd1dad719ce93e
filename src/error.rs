use axum::extract::multipart::MultipartError;
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    auth::AuthError,
    dao::blob_store::BlobError,
    dao::storage::StoreError,
    oracle::OracleError,
    state::{phase::InvalidTransition, ring::RingError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Game storage backend is unavailable.
    #[error("storage unavailable")]
    StorageUnavailable(#[source] StoreError),
    /// Photo storage backend is unavailable.
    #[error("photo storage unavailable")]
    BlobUnavailable(#[source] BlobError),
    /// Face verification oracle is unavailable.
    #[error("verification oracle unavailable")]
    OracleUnavailable(#[source] OracleError),
    /// Application is running in degraded mode without its backends.
    #[error("backend unavailable (degraded mode)")]
    Degraded,
    /// Caller presented no credential or an invalid one.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Caller is known but not allowed to do this.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A finite resource ran out, such as free join codes.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The elimination proof did not match the claimed victim.
    #[error("face verification failed")]
    VerificationFailed,
    /// Invariant breach inside the backend itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable { .. } => ServiceError::StorageUnavailable(err),
            StoreError::CodeTaken
            | StoreError::UsernameTaken
            | StoreError::AlreadyJoined
            | StoreError::DuplicateElimination
            | StoreError::VersionConflict => ServiceError::InvalidState(err.to_string()),
        }
    }
}

impl From<BlobError> for ServiceError {
    fn from(err: BlobError) -> Self {
        ServiceError::BlobUnavailable(err)
    }
}

impl From<OracleError> for ServiceError {
    fn from(err: OracleError) -> Self {
        ServiceError::OracleUnavailable(err)
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredential { .. } | AuthError::InvalidSubject { .. } => {
                ServiceError::Unauthenticated(err.to_string())
            }
            AuthError::Signing { .. } => ServiceError::Internal(err.to_string()),
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<RingError> for ServiceError {
    fn from(err: RingError) -> Self {
        match err {
            RingError::TooSmall { .. } => ServiceError::InvalidState(err.to_string()),
            // A live session with broken target edges is corrupt data, not a
            // caller mistake.
            RingError::DetachedParticipant { .. } | RingError::BrokenCycle => {
                ServiceError::Internal(err.to_string())
            }
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or invalid credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Authenticated but not allowed.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Request was well-formed but the proof it carried was rejected.
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::StorageUnavailable(source) => {
                AppError::ServiceUnavailable(source.to_string())
            }
            ServiceError::BlobUnavailable(source) => {
                AppError::ServiceUnavailable(source.to_string())
            }
            ServiceError::OracleUnavailable(source) => {
                AppError::ServiceUnavailable(source.to_string())
            }
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthenticated(message) => AppError::Unauthorized(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::ResourceExhausted(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::VerificationFailed => {
                AppError::Unprocessable("face verification failed".into())
            }
            ServiceError::Internal(message) => AppError::Internal(message),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(format!("malformed multipart body: {}", err))
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
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_violations_become_conflicts() {
        let err: ServiceError = StoreError::AlreadyJoined.into();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let err: ServiceError = StoreError::VersionConflict.into();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[test]
    fn backend_outages_become_unavailable() {
        let source = StoreError::unavailable(
            "connection refused",
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        );
        let err: ServiceError = source.into();
        assert!(matches!(err, ServiceError::StorageUnavailable(_)));
        assert!(matches!(
            AppError::from(err),
            AppError::ServiceUnavailable(_)
        ));
    }

    #[test]
    fn verification_failure_maps_to_unprocessable() {
        assert!(matches!(
            AppError::from(ServiceError::VerificationFailed),
            AppError::Unprocessable(_)
        ));
    }
}
