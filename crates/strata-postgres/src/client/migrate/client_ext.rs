//! Extension trait for PgClient providing migration functionality.
//!
//! This module provides a clean extension trait that adds migration capabilities
//! to the `PgClient` struct, keeping migration-related functionality separate
//! from the core database client implementation.

use std::future::Future;
use std::path::Path;

use super::{MigrationResult, MigrationStatus, run_migration};
use crate::{PgClient, PgResult};

/// Extension trait providing migration functionality for PgClient.
pub trait PgClientMigrationExt {
    /// Applies the pending migrations of `schema` found in `directory`.
    ///
    /// It's safe to call this method multiple times and from several
    /// processes at once: each migration is applied exactly once.
    ///
    /// # Errors
    ///
    /// Returns an error if the migration files cannot be loaded, or if a
    /// migration fails to apply. Migrations applied before the failure stay
    /// applied.
    fn update_schema(
        &self,
        schema: &str,
        directory: &Path,
    ) -> impl Future<Output = PgResult<MigrationResult>> + Send;

    /// Applies pending migrations for every schema of the configuration.
    ///
    /// Schemas are updated in configuration order and the first failure
    /// stops the run.
    fn update_schemas(&self) -> impl Future<Output = PgResult<Vec<MigrationResult>>> + Send;

    /// Gets the migration status of `schema`.
    ///
    /// # Errors
    ///
    /// Returns an error if the migration files cannot be loaded or the
    /// database cannot be queried.
    fn migration_status(
        &self,
        schema: &str,
        directory: &Path,
    ) -> impl Future<Output = PgResult<MigrationStatus>> + Send;
}

impl PgClientMigrationExt for PgClient {
    async fn update_schema(&self, schema: &str, directory: &Path) -> PgResult<MigrationResult> {
        run_migration::update_schema(self, schema, directory).await
    }

    async fn update_schemas(&self) -> PgResult<Vec<MigrationResult>> {
        run_migration::update_schemas(self).await
    }

    async fn migration_status(&self, schema: &str, directory: &Path) -> PgResult<MigrationStatus> {
        run_migration::migration_status(self, schema, directory).await
    }
}
