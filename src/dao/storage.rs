use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by storage backends regardless of the underlying database.
///
/// Constraint violations get their own variants so the service layer can fold
/// them into the caller-facing taxonomy (duplicate join, duplicate elimination
/// and code collisions all become conflicts, not opaque backend failures).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not serve the request at all.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable summary of the failing operation.
        message: String,
        /// Underlying backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Another session already owns the join code.
    #[error("join code already in use")]
    CodeTaken,
    /// Another user already registered the username.
    #[error("username already registered")]
    UsernameTaken,
    /// The (user, session) pair already exists.
    #[error("user already joined this session")]
    AlreadyJoined,
    /// The (eliminator, eliminated) pair already exists.
    #[error("elimination already recorded for this pair")]
    DuplicateElimination,
    /// The session version moved between read and conditional write.
    #[error("session was modified concurrently")]
    VersionConflict,
}

impl StoreError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::Unavailable {
            message: message.into(),
            source: Box::new(source),
        }
    }
}
