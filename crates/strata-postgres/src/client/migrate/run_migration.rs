use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use diesel_async::scoped_futures::ScopedFutureExt;

use super::{MigrationResult, MigrationStatus, Migrations, schema_versions};
use crate::{AdvisoryLock, PgClient, PgConnExt, PgError, PgResult, TRACING_TARGET_MIGRATION};

/// Applies the pending migrations found in `directory` to `schema`.
///
/// Every cooperating process serializes on [`AdvisoryLock::MIGRATIONS`] for
/// the whole run. Each migration is applied in its own transaction together
/// with its `schema_versions` row; the run stops at the first failure and
/// keeps the migrations committed before it.
#[tracing::instrument(skip(pg), target = TRACING_TARGET_MIGRATION)]
pub async fn update_schema(
    pg: &PgClient,
    schema: &str,
    directory: &Path,
) -> PgResult<MigrationResult> {
    tracing::info!(
        target: TRACING_TARGET_MIGRATION,
        schema,
        directory = %directory.display(),
        "Updating schema"
    );

    let start_time = Instant::now();
    let migrations = Migrations::load_directory(schema, directory).await?;

    if migrations.is_empty() {
        tracing::info!(
            target: TRACING_TARGET_MIGRATION,
            schema,
            "No migration available"
        );
        return Ok(MigrationResult::new(schema, start_time.elapsed(), Vec::new()));
    }

    let versions = pg
        .with_tx(|conn| {
            async move {
                conn.take_advisory_tx_lock(AdvisoryLock::MIGRATIONS)
                    .await
                    .map_err(|err| {
                        PgError::migration(format!("cannot take advisory lock: {}", err))
                    })?;

                // The per-migration transactions run on other connections
                // and must see the table before this transaction ends.
                pg.with_conn(|conn| schema_versions::create_table(conn).scope_boxed())
                    .await
                    .map_err(|err| {
                        PgError::migration(format!(
                            "cannot create schema version table: {}",
                            err
                        ))
                    })?;

                let applied = schema_versions::load_versions(conn, schema)
                    .await
                    .map_err(|err| {
                        PgError::migration(format!("cannot load schema versions: {}", err))
                    })?;

                let mut pending = migrations;
                pending.reject_versions(&applied);
                pending.sort();

                apply_migrations(pg, pending).await
            }
            .scope_boxed()
        })
        .await?;

    let closed = pg.close_idle_connections();
    let duration = start_time.elapsed();

    tracing::info!(
        target: TRACING_TARGET_MIGRATION,
        schema,
        duration = ?duration,
        migrations_count = versions.len(),
        closed_connections = closed,
        "Schema update completed"
    );

    Ok(MigrationResult::new(schema, duration, versions))
}

/// Applies `migrations` in order, each in its own transaction.
async fn apply_migrations(pg: &PgClient, migrations: Migrations) -> PgResult<Vec<String>> {
    let mut versions = Vec::with_capacity(migrations.len());

    for migration in &migrations {
        tracing::info!(
            target: TRACING_TARGET_MIGRATION,
            migration = %migration,
            "Applying migration"
        );

        let start_time = Instant::now();
        pg.with_tx(|conn| {
            async move {
                conn.exec(&migration.code).await?;
                schema_versions::insert_version(conn, &migration.schema, &migration.version)
                    .await?;
                Ok::<_, PgError>(())
            }
            .scope_boxed()
        })
        .await
        .map_err(|err| {
            tracing::error!(
                target: TRACING_TARGET_MIGRATION,
                migration = %migration,
                error = %err,
                "Migration failed"
            );
            PgError::migration(format!("cannot apply migration {}: {}", migration, err))
        })?;

        tracing::debug!(
            target: TRACING_TARGET_MIGRATION,
            migration = %migration,
            elapsed = ?start_time.elapsed(),
            "Migration applied"
        );

        versions.push(migration.version.clone());
    }

    Ok(versions)
}

/// Updates every schema listed in the client configuration, in order.
///
/// Each schema is read from `<schema directory>/<schema name>`. Does nothing
/// if no schema directory is configured.
pub async fn update_schemas(pg: &PgClient) -> PgResult<Vec<MigrationResult>> {
    let config = pg.config();
    let Some(root) = config.schema_directory() else {
        return Ok(Vec::new());
    };

    let mut results = Vec::with_capacity(config.schema_names().len());
    for schema in config.schema_names() {
        results.push(update_schema(pg, schema, &root.join(schema)).await?);
    }

    Ok(results)
}

/// Reports applied and pending versions of `schema`.
///
/// Applied versions come from `schema_versions` (none if the table does not
/// exist yet), pending versions from the migration files in `directory`.
#[tracing::instrument(skip(pg), target = TRACING_TARGET_MIGRATION)]
pub async fn migration_status(
    pg: &PgClient,
    schema: &str,
    directory: &Path,
) -> PgResult<MigrationStatus> {
    let mut pending = Migrations::load_directory(schema, directory).await?;

    let applied = pg
        .with_conn(|conn| {
            async move {
                let versions = if schema_versions::table_exists(conn).await? {
                    schema_versions::load_versions(conn, schema).await?
                } else {
                    HashSet::new()
                };
                Ok::<_, PgError>(versions)
            }
            .scope_boxed()
        })
        .await?;

    pending.reject_versions(&applied);
    pending.sort();

    let mut applied_versions: Vec<String> = applied.into_iter().collect();
    applied_versions.sort();

    let status = MigrationStatus::new(schema, applied_versions, pending.versions());

    tracing::debug!(
        target: TRACING_TARGET_MIGRATION,
        schema,
        applied_count = status.applied_migrations(),
        pending_count = status.pending_migrations(),
        is_up_to_date = status.is_up_to_date(),
        "Migration status retrieved"
    );

    Ok(status)
}
