//! Integration tests for pooled connections and transactions.
//!
//! These tests require a running PostgreSQL database, see `common/mod.rs`.
//! Run with: cargo test --test client -- --ignored

mod common;

use diesel::sql_types::{Bool, Text};
use diesel_async::RunQueryDsl;
use strata_postgres::scoped_futures::ScopedFutureExt;
use strata_postgres::{PgConnExt, PgError, quote_identifier, quote_string};

#[tokio::test]
#[ignore = "requires a PostgreSQL server (POSTGRES_URL)"]
async fn test_connect_and_ping() {
    let client = common::connect(common::test_config()).await;

    client.ping().await.expect("ping should succeed");
    let status = client.pool_status();
    assert_eq!(status.max_connections, 4);
    assert!(status.connections >= 1);

    client.close().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (POSTGRES_URL)"]
async fn test_transaction_error_rolls_back() {
    let client = common::connect(common::test_config()).await;
    let table = common::unique_name("tx_error");
    common::exec(&client, &format!("CREATE TABLE {table} (id INT NOT NULL)")).await;

    let insert = format!("INSERT INTO {table} (id) VALUES (1)");
    let result: Result<(), PgError> = client
        .with_tx(|conn| {
            async move {
                conn.exec(&insert).await?;
                Err(PgError::Unexpected("abort".into()))
            }
            .scope_boxed()
        })
        .await;

    assert!(matches!(result, Err(PgError::Unexpected(_))));
    assert_eq!(common::count_rows(&client, &table).await, 0);

    common::exec(&client, &format!("DROP TABLE {table}")).await;
    client.close().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (POSTGRES_URL)"]
async fn test_transaction_commits() {
    let client = common::connect(common::test_config()).await;
    let table = common::unique_name("tx_commit");
    common::exec(&client, &format!("CREATE TABLE {table} (id INT NOT NULL)")).await;

    let insert = format!("INSERT INTO {table} (id) VALUES (1), (2)");
    let inserted = client
        .with_tx(|conn| async move { conn.exec_count(&insert).await }.scope_boxed())
        .await
        .expect("transaction should commit");

    assert_eq!(inserted, 2);
    assert_eq!(common::count_rows(&client, &table).await, 2);

    common::exec(&client, &format!("DROP TABLE {table}")).await;
    client.close().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (POSTGRES_URL)"]
async fn test_transaction_panic_rolls_back_without_leaking_connections() {
    let config = common::test_config()
        .with_max_connections(2)
        .with_acquisition_timeout_ms(1000);
    let client = common::connect(config).await;
    let table = common::unique_name("tx_panic");
    common::exec(&client, &format!("CREATE TABLE {table} (id INT NOT NULL)")).await;

    for _ in 0..3 {
        let task_client = client.clone();
        let insert = format!("INSERT INTO {table} (id) VALUES (1)");
        let joined = tokio::spawn(async move {
            task_client
                .with_tx(|conn| {
                    async move {
                        conn.exec(&insert).await?;
                        if !insert.is_empty() {
                            panic!("transaction body panicked");
                        }
                        Ok::<_, PgError>(())
                    }
                    .scope_boxed()
                })
                .await
        })
        .await;

        assert!(joined.expect_err("task should panic").is_panic());
    }

    // Both pool slots are still usable at the same time.
    let first = client.acquire().await.expect("first connection");
    let second = client.acquire().await.expect("second connection");
    drop((first, second));

    assert_eq!(common::count_rows(&client, &table).await, 0);

    common::exec(&client, &format!("DROP TABLE {table}")).await;
    client.close().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (POSTGRES_URL)"]
async fn test_failed_rollback_keeps_original_error() {
    let config = common::test_config().with_max_connections(2);
    let client = common::connect(config).await;

    let result: Result<(), PgError> = client
        .with_tx(|conn| {
            async move {
                // Kills this session, so the rollback that follows fails.
                let _ = conn
                    .exec("SELECT pg_terminate_backend(pg_backend_pid())")
                    .await;
                Err(PgError::Config("original".into()))
            }
            .scope_boxed()
        })
        .await;

    assert!(matches!(result, Err(PgError::Config(message)) if message == "original"));

    // The terminated connection is discarded instead of being reused.
    for _ in 0..2 {
        client.ping().await.expect("ping should succeed");
    }
    client.close().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (POSTGRES_URL)"]
async fn test_nested_transactions_exhaust_pool() {
    let config = common::test_config()
        .with_max_connections(2)
        .with_acquisition_timeout_ms(200);
    let client = common::connect(config).await;

    let inner_client = client.clone();
    let result: Result<(), PgError> = client
        .with_tx(|_| {
            async move {
                let innermost_client = inner_client.clone();
                inner_client
                    .with_tx(|_| {
                        async move {
                            innermost_client
                                .with_tx(|_| async { Ok::<_, PgError>(()) }.scope_boxed())
                                .await
                        }
                        .scope_boxed()
                    })
                    .await
            }
            .scope_boxed()
        })
        .await;

    assert!(matches!(result, Err(PgError::NoConnectionAvailable)));

    // The pool recovers once the outer transactions end.
    client.ping().await.expect("ping should succeed");
    client.close().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL server (POSTGRES_URL)"]
async fn test_quoting_round_trips() {
    #[derive(diesel::QueryableByName)]
    struct Matches {
        #[diesel(sql_type = Bool)]
        matches: bool,
    }

    #[derive(diesel::QueryableByName)]
    struct Column {
        #[diesel(sql_type = Text)]
        name: String,
    }

    let client = common::connect(common::test_config()).await;

    for value in ["", "foo", "it's", "''", "a \"b\" c", "événement"] {
        let value = value.to_owned();
        let query = format!("SELECT {} = $1 AS matches", quote_string(&value));
        let row: Matches = client
            .with_conn(|conn| {
                async move {
                    let row: Matches = diesel::sql_query(query)
                        .bind::<Text, _>(value)
                        .get_result(conn)
                        .await?;
                    Ok::<_, PgError>(row)
                }
                .scope_boxed()
            })
            .await
            .expect("literal query should succeed");
        assert!(row.matches);
    }

    for name in ["foo", "_foo$1", "123foo", "foo bar", "foo \"bar\"", "Upper Case"] {
        let name = name.to_owned();
        let create = format!(
            "CREATE TEMPORARY TABLE strata_quote_test ({} INT)",
            quote_identifier(&name)
        );
        let column: Column = client
            .with_tx(|conn| {
                async move {
                    conn.exec(&create).await?;
                    let column: Column = diesel::sql_query(
                        "SELECT attname::text AS name FROM pg_attribute \
                         WHERE attrelid = 'strata_quote_test'::regclass AND attnum = 1",
                    )
                    .get_result(conn)
                    .await?;
                    conn.exec("DROP TABLE strata_quote_test").await?;
                    Ok::<_, PgError>(column)
                }
                .scope_boxed()
            })
            .await
            .expect("identifier query should succeed");
        assert_eq!(column.name, name);
    }

    client.close().await;
}
