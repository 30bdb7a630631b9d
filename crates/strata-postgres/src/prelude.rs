//! Prelude module for strata-postgres.
//!
//! This module re-exports the most commonly used types and traits from strata-postgres,
//! making it easy to import everything you need with a single `use` statement.
//!
//! # Example
//!
//! ```rust,no_run
//! use strata_postgres::prelude::*;
//!
//! # async fn example() -> PgResult<()> {
//! let client = PgConfig::new("postgresql://localhost/mydb").build()?;
//! client.ping().await?;
//! # Ok(())
//! # }
//! ```

// Query traits
pub use diesel_async::RunQueryDsl;
pub use diesel_async::scoped_futures::ScopedFutureExt;

// Client types
pub use crate::client::migrate::{MigrationResult, MigrationStatus, PgClientMigrationExt};
pub use crate::client::notify::Subscription;
pub use crate::client::{PgClient, PgConfig, PgConnExt, PgPoolStatus};
// Connection type
pub use crate::PgConnection;
// Error types
pub use crate::{PgError, PgResult};
