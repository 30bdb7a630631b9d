//! Database migration management.
//!
//! Migrations are plain SQL files named after a UTC timestamp
//! (`<directory>/<schema>/YYYYMMDDTHHMMSSZ.sql`). Applied versions are
//! recorded per schema in the `schema_versions` table, and concurrent runs
//! from several processes are serialized through
//! [`AdvisoryLock::MIGRATIONS`].
//!
//! [`AdvisoryLock::MIGRATIONS`]: crate::AdvisoryLock::MIGRATIONS

mod client_ext;
mod migrate_result;
mod migration;
mod run_migration;
mod schema_versions;

pub use client_ext::PgClientMigrationExt;
pub use migrate_result::{MigrationResult, MigrationStatus};
pub use migration::{Migration, Migrations, validate_version};
pub use run_migration::{migration_status, update_schema, update_schemas};
