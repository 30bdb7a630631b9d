//! PostgreSQL client with connection pooling, migrations and notifications.
//!
//! This module provides a high-level interface for connecting to PostgreSQL
//! databases: a bounded connection pool with transaction discipline, a
//! file-based schema migration engine serialized through an advisory lock,
//! and reconnecting `LISTEN`/`NOTIFY` listeners.

pub(crate) mod custom_hooks;
pub mod migrate;
pub mod notify;
mod pg_client;
mod pg_config;
mod pg_conn;
mod pool_status;

use deadpool::managed::{Object, Pool};
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
pub use pg_client::PgClient;
pub use pg_config::PgConfig;
pub use pg_conn::PgConnExt;
pub use pool_status::PgPoolStatus;

/// Type alias for the connection pool used throughout the application.
pub type ConnectionPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Type alias for a connection object from the pool.
pub type PooledConnection = Object<AsyncDieselConnectionManager<AsyncPgConnection>>;
