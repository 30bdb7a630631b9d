use std::future::Future;

use diesel::sql_types::{Integer, Text};
use diesel_async::{AsyncPgConnection, RunQueryDsl, SimpleAsyncConnection};

use crate::{AdvisoryLock, PgResult, TRACING_TARGET_CONNECTION, quote_channel};

/// Statement-level helpers available on every [`PgConnection`].
///
/// Parameterized queries go through diesel directly
/// (`diesel::sql_query(..).bind::<T, _>(..)` with `execute`, `load` or
/// `get_result`). This trait covers the operations that diesel does not
/// express on its own.
///
/// [`PgConnection`]: crate::PgConnection
pub trait PgConnExt {
    /// Executes one or more SQL statements without parameters.
    ///
    /// Used for migration scripts, which may contain several statements.
    fn exec(&mut self, sql: &str) -> impl Future<Output = PgResult<()>> + Send;

    /// Executes a single SQL statement and returns the number of affected rows.
    fn exec_count(&mut self, sql: &str) -> impl Future<Output = PgResult<usize>> + Send;

    /// Takes a transaction-scoped advisory lock.
    ///
    /// Blocks until the lock is granted; the lock is released when the
    /// surrounding transaction ends.
    fn take_advisory_tx_lock(
        &mut self,
        lock: AdvisoryLock,
    ) -> impl Future<Output = PgResult<()>> + Send;

    /// Sends a notification with `pg_notify`.
    fn notify(&mut self, channel: &str, payload: &str)
    -> impl Future<Output = PgResult<()>> + Send;

    /// Subscribes this session to a notification channel.
    fn listen(&mut self, channel: &str) -> impl Future<Output = PgResult<()>> + Send;
}

impl PgConnExt for AsyncPgConnection {
    async fn exec(&mut self, sql: &str) -> PgResult<()> {
        self.batch_execute(sql).await?;
        Ok(())
    }

    async fn exec_count(&mut self, sql: &str) -> PgResult<usize> {
        let affected = diesel::sql_query(sql).execute(self).await?;
        Ok(affected)
    }

    async fn take_advisory_tx_lock(&mut self, lock: AdvisoryLock) -> PgResult<()> {
        tracing::debug!(
            target: TRACING_TARGET_CONNECTION,
            lock = %lock,
            "Waiting for advisory transaction lock"
        );

        diesel::sql_query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind::<Integer, _>(lock.namespace)
            .bind::<Integer, _>(lock.id)
            .execute(self)
            .await?;

        tracing::debug!(
            target: TRACING_TARGET_CONNECTION,
            lock = %lock,
            "Advisory transaction lock acquired"
        );

        Ok(())
    }

    async fn notify(&mut self, channel: &str, payload: &str) -> PgResult<()> {
        diesel::sql_query("SELECT pg_notify($1, $2)")
            .bind::<Text, _>(channel)
            .bind::<Text, _>(payload)
            .execute(self)
            .await?;
        Ok(())
    }

    async fn listen(&mut self, channel: &str) -> PgResult<()> {
        let statement = format!("LISTEN {}", quote_channel(channel));
        self.batch_execute(&statement).await?;
        Ok(())
    }
}
