//! Error types shared by the PostgreSQL storage implementation.

use thiserror::Error;

use crate::dao::storage::StoreError;

/// Convenient result alias returning [`PgDaoError`] failures.
pub type PgResult<T> = Result<T, PgDaoError>;

/// Failures that can occur while interacting with PostgreSQL.
#[derive(Debug, Error)]
pub enum PgDaoError {
    /// Required environment variable is missing.
    #[error("missing PostgreSQL environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Opening the connection pool failed.
    #[error("failed to connect to PostgreSQL")]
    Connect {
        #[source]
        source: sqlx::Error,
    },
    /// Creating the tables and indexes failed.
    #[error("failed to prepare PostgreSQL schema")]
    Schema {
        #[source]
        source: sqlx::Error,
    },
    /// Opening or committing a transaction failed.
    #[error("PostgreSQL transaction failed during {operation}")]
    Transaction {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
    /// A statement failed for a reason other than a constraint violation.
    #[error("PostgreSQL query failed during {operation}")]
    Query {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl From<PgDaoError> for StoreError {
    fn from(value: PgDaoError) -> Self {
        StoreError::unavailable(value.to_string(), value)
    }
}
