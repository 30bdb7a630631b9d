//! Integration tests for the schema migration engine.
//!
//! These tests require a running PostgreSQL database, see `common/mod.rs`.
//! Run with: cargo test --test migrations -- --ignored

mod common;

use std::fs;
use std::path::Path;

use strata_postgres::{PgClientMigrationExt, PgError};
use tempfile::TempDir;

/// Writes `migrations` (version, sql) into `<root>/<schema>/`.
fn write_migrations(root: &Path, schema: &str, migrations: &[(&str, String)]) {
    let directory = root.join(schema);
    fs::create_dir_all(&directory).expect("Failed to create schema directory");
    for (version, sql) in migrations {
        fs::write(directory.join(format!("{version}.sql")), sql)
            .expect("Failed to write migration");
    }
}

fn table_migrations(schema: &str) -> Vec<(&'static str, String)> {
    vec![
        (
            "20240101T000000Z",
            format!("CREATE TABLE {schema}_accounts (id INT PRIMARY KEY);"),
        ),
        (
            "20240102T000000Z",
            format!(
                "CREATE TABLE {schema}_events (id INT PRIMARY KEY);\n\
                 INSERT INTO {schema}_accounts (id) VALUES (1);"
            ),
        ),
        (
            "20240103T000000Z",
            format!("ALTER TABLE {schema}_events ADD COLUMN payload TEXT;"),
        ),
    ]
}

async fn cleanup(client: &strata_postgres::PgClient, schema: &str) {
    common::exec(
        client,
        &format!(
            "DROP TABLE IF EXISTS {schema}_events, {schema}_accounts;\n\
             DELETE FROM schema_versions WHERE schema = '{schema}';"
        ),
    )
    .await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (POSTGRES_URL)"]
async fn test_update_schema_is_idempotent() {
    let client = common::connect(common::test_config()).await;
    let schema = common::unique_name("idempotent");
    let root = TempDir::new().expect("tempdir");
    write_migrations(root.path(), &schema, &table_migrations(&schema));
    let directory = root.path().join(&schema);

    let first = client
        .update_schema(&schema, &directory)
        .await
        .expect("first run should succeed");
    assert_eq!(
        first.processed_versions,
        ["20240101T000000Z", "20240102T000000Z", "20240103T000000Z"]
    );
    assert_eq!(client.pool_status().idle_connections, 0);

    let second = client
        .update_schema(&schema, &directory)
        .await
        .expect("second run should succeed");
    assert!(second.is_no_op());

    assert_eq!(common::count_schema_versions(&client, &schema).await, 3);
    assert_eq!(
        common::count_rows(&client, &format!("{schema}_accounts")).await,
        1
    );

    let status = client
        .migration_status(&schema, &directory)
        .await
        .expect("status should load");
    assert!(status.is_up_to_date());
    assert_eq!(status.applied_migrations(), 3);

    cleanup(&client, &schema).await;
    client.close().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (POSTGRES_URL)"]
async fn test_concurrent_runs_apply_each_migration_once() {
    let schema = common::unique_name("concurrent");
    let root = TempDir::new().expect("tempdir");
    write_migrations(root.path(), &schema, &table_migrations(&schema));
    let directory = root.path().join(&schema);

    let mut clients = Vec::new();
    for _ in 0..4 {
        clients.push(common::connect(common::test_config()).await);
    }

    let runs = clients
        .iter()
        .map(|client| client.update_schema(&schema, &directory));
    let results = futures::future::join_all(runs).await;

    let mut applied = 0;
    for result in results {
        let result = result.expect("every run should succeed");
        applied += result.processed_versions.len();
    }

    assert_eq!(applied, 3);
    assert_eq!(common::count_schema_versions(&clients[0], &schema).await, 3);

    cleanup(&clients[0], &schema).await;
    for client in clients {
        client.close().await;
    }
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (POSTGRES_URL)"]
async fn test_failed_migration_keeps_earlier_ones() {
    let client = common::connect(common::test_config()).await;
    let schema = common::unique_name("failing");
    let root = TempDir::new().expect("tempdir");

    let mut migrations = table_migrations(&schema);
    migrations[1].1 = format!("CREATE TABLE {schema}_events (id INT PRIMARY KEY); SELEC 1;");
    write_migrations(root.path(), &schema, &migrations);
    let directory = root.path().join(&schema);

    let err = client
        .update_schema(&schema, &directory)
        .await
        .expect_err("second migration should fail");
    assert!(matches!(err, PgError::Migration(_)));
    assert!(err.to_string().contains("20240102T000000Z"));

    assert_eq!(common::count_schema_versions(&client, &schema).await, 1);

    let status = client
        .migration_status(&schema, &directory)
        .await
        .expect("status should load");
    assert_eq!(status.last_applied_version(), Some("20240101T000000Z"));
    assert_eq!(status.next_pending_version(), Some("20240102T000000Z"));
    assert_eq!(status.pending_migrations(), 2);

    cleanup(&client, &schema).await;
    client.close().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (POSTGRES_URL)"]
async fn test_connect_runs_configured_schemas() {
    let first = common::unique_name("startup_a");
    let second = common::unique_name("startup_b");
    let root = TempDir::new().expect("tempdir");
    write_migrations(root.path(), &first, &table_migrations(&first));
    write_migrations(root.path(), &second, &table_migrations(&second)[..1]);

    let config = common::test_config()
        .with_schema_directory(root.path())
        .with_schema_names([first.clone(), second.clone()]);
    let client = common::connect(config).await;

    assert_eq!(common::count_schema_versions(&client, &first).await, 3);
    assert_eq!(common::count_schema_versions(&client, &second).await, 1);

    cleanup(&client, &first).await;
    cleanup(&client, &second).await;
    client.close().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (POSTGRES_URL)"]
async fn test_connect_fails_on_invalid_migration_name() {
    let schema = common::unique_name("invalid");
    let root = TempDir::new().expect("tempdir");
    let migrations = [("0001_init", "SELECT 1;".to_string())];
    write_migrations(root.path(), &schema, &migrations);

    let config = common::test_config()
        .with_schema_directory(root.path())
        .with_schema_names([schema.clone()]);
    let result = strata_postgres::PgClient::connect(config).await;

    assert!(matches!(result, Err(PgError::Migration(_))));
}
