//! Bookkeeping table recording applied migrations.

use std::collections::HashSet;

use diesel::sql_types::{Bool, Text};
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::{PgConnExt, PgResult};

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_versions
  (schema VARCHAR NOT NULL,
   version VARCHAR NOT NULL,
   migration_date TIMESTAMPTZ NOT NULL DEFAULT (CURRENT_TIMESTAMP),

   PRIMARY KEY (schema, version));
";

#[derive(diesel::QueryableByName)]
struct VersionRow {
    #[diesel(sql_type = Text)]
    version: String,
}

#[derive(diesel::QueryableByName)]
struct ExistsRow {
    #[diesel(sql_type = Bool)]
    found: bool,
}

/// Creates the `schema_versions` table if it does not exist.
pub async fn create_table(conn: &mut AsyncPgConnection) -> PgResult<()> {
    conn.exec(CREATE_TABLE).await
}

/// Returns whether the `schema_versions` table exists.
pub async fn table_exists(conn: &mut AsyncPgConnection) -> PgResult<bool> {
    let row: ExistsRow =
        diesel::sql_query("SELECT to_regclass('schema_versions') IS NOT NULL AS found")
            .get_result(conn)
            .await?;
    Ok(row.found)
}

/// Loads the versions already applied for `schema`.
pub async fn load_versions(
    conn: &mut AsyncPgConnection,
    schema: &str,
) -> PgResult<HashSet<String>> {
    let rows: Vec<VersionRow> =
        diesel::sql_query("SELECT version FROM schema_versions WHERE schema = $1")
            .bind::<Text, _>(schema)
            .load(conn)
            .await?;

    Ok(rows.into_iter().map(|row| row.version).collect())
}

/// Records `version` as applied for `schema`.
pub async fn insert_version(
    conn: &mut AsyncPgConnection,
    schema: &str,
    version: &str,
) -> PgResult<()> {
    diesel::sql_query("INSERT INTO schema_versions (schema, version) VALUES ($1, $2)")
        .bind::<Text, _>(schema)
        .bind::<Text, _>(version)
        .execute(conn)
        .await?;
    Ok(())
}
