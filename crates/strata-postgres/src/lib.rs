#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

// Tracing target constants for consistent logging.

/// Tracing target for client-related operations.
///
/// Use this target for logging client initialization, configuration, and lifecycle events.
pub const TRACING_TARGET_CLIENT: &str = "strata_postgres::client";

/// Tracing target for database connection operations.
///
/// Use this target for logging connection establishment, pool management, and connection errors.
pub const TRACING_TARGET_CONNECTION: &str = "strata_postgres::connection";

/// Tracing target for database migration operations.
///
/// Use this target for logging migration loading, application and status checks.
pub const TRACING_TARGET_MIGRATION: &str = "strata_postgres::migrations";

/// Tracing target for notification listeners.
///
/// Use this target for logging `LISTEN` sessions, reconnections and payload fan-out.
pub const TRACING_TARGET_LISTENER: &str = "strata_postgres::listener";

mod client;
mod error;
pub mod prelude;
pub mod types;

pub use diesel_async::AsyncPgConnection as PgConnection;
pub use diesel_async::scoped_futures;

pub use crate::client::migrate;
pub use crate::client::notify;
pub use crate::client::{
    ConnectionPool, PgClient, PgConfig, PgConnExt, PgPoolStatus, PooledConnection,
};
pub use crate::client::migrate::{
    Migration, MigrationResult, MigrationStatus, Migrations, PgClientMigrationExt,
};
pub use crate::client::notify::{Backoff, Subscription};
pub use crate::error::{BoxError, PgError, PgResult};
pub use crate::types::{AdvisoryLock, quote_channel, quote_identifier, quote_string};
