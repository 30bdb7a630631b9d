//! Error types and utilities for database operations.
//!
//! This module provides the error type shared by the pool, the transaction
//! runner, the migration engine and the notification listeners.

use std::borrow::Cow;

use deadpool::managed::TimeoutType;
use diesel::result::{ConnectionError, Error};
use diesel_async::pooled_connection::PoolError as DieselPoolError;
use diesel_async::pooled_connection::deadpool::PoolError as DeadpoolError;

/// Type-erased error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for all PostgreSQL client operations.
///
/// Closures passed to [`PgClient::with_conn`] and [`PgClient::with_tx`] may
/// return their own error type as long as it implements `From<PgError>`, so
/// callers keep matching against their own error semantics.
///
/// [`PgClient::with_conn`]: crate::PgClient::with_conn
/// [`PgClient::with_tx`]: crate::PgClient::with_tx
#[derive(Debug, thiserror::Error)]
#[must_use = "database errors should be handled appropriately"]
pub enum PgError {
    /// Invalid configuration.
    ///
    /// Covers invalid connection URIs and out-of-range pool settings. Fatal
    /// at startup, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No pooled connection became available before the acquisition timeout.
    ///
    /// This means the pool is overloaded, not that the database is broken;
    /// callers decide whether to retry.
    #[error("No connection available")]
    NoConnectionAvailable,

    /// Establishing or recycling a connection timed out.
    #[error("Database operation timed out ({0:?})")]
    Timeout(TimeoutType),

    /// Failed to establish a database connection.
    ///
    /// This includes authentication failures, network issues, and invalid
    /// connection parameters.
    #[error("Database connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Loading or applying schema migrations failed.
    #[error("Database migration error: {0}")]
    Migration(BoxError),

    /// Database query execution failed.
    ///
    /// This includes SQL syntax errors, constraint violations, type mismatches,
    /// and failures to begin or commit a transaction.
    #[error("Database query error: {0}")]
    Query(#[from] Error),

    /// The client has been closed.
    #[error("Database client is closed")]
    Closed,

    /// Unexpected error occurred.
    #[error("Unexpected error: {0}")]
    Unexpected(Cow<'static, str>),
}

impl PgError {
    /// Creates a migration error from a message.
    pub(crate) fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into().into())
    }

    /// Extracts the constraint name from a constraint violation error.
    pub fn constraint(&self) -> Option<&str> {
        let PgError::Query(err) = self else {
            return None;
        };

        let Error::DatabaseError(_, err) = err else {
            return None;
        };

        err.constraint_name()
    }

    /// Returns whether this error is the pool exhaustion condition.
    #[inline]
    pub fn is_no_connection_available(&self) -> bool {
        matches!(self, PgError::NoConnectionAvailable)
    }

    /// Returns whether this error indicates a transient failure that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PgError::NoConnectionAvailable
                | PgError::Timeout(_)
                | PgError::Connection(ConnectionError::BadConnection(_))
        )
    }

    /// Returns whether this error indicates a permanent failure that won't succeed on retry.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

impl From<DeadpoolError> for PgError {
    fn from(value: DeadpoolError) -> Self {
        match value {
            DeadpoolError::Timeout(TimeoutType::Wait) => Self::NoConnectionAvailable,
            DeadpoolError::Timeout(timeout) => Self::Timeout(timeout),
            DeadpoolError::Backend(DieselPoolError::QueryError(error)) => Self::Query(error),
            DeadpoolError::Backend(DieselPoolError::ConnectionError(error)) => {
                Self::Connection(error)
            }
            DeadpoolError::PostCreateHook(err) => {
                tracing::warn!("Unexpected post-create hook error: {}", err);
                Self::Unexpected(err.to_string().into())
            }
            DeadpoolError::NoRuntimeSpecified => {
                tracing::error!("No tokio runtime specified for connection pool");
                Self::Unexpected("No runtime specified".into())
            }
            DeadpoolError::Closed => Self::Closed,
        }
    }
}

/// Specialized [`Result`] type for database operations.
pub type PgResult<T, E = PgError> = Result<T, E>;
