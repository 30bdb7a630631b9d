//! Includes all callbacks and hooks for [`diesel`] and [`deadpool`].

use std::time::Instant;

use deadpool::managed::{HookError, HookResult, Metrics};
use diesel::ConnectionResult;
use diesel_async::pooled_connection::{PoolError, PoolableConnection};
use diesel_async::{AsyncConnection, AsyncPgConnection};
use futures::FutureExt;
use futures::future::BoxFuture;

use super::pg_config::mask_url;
use crate::TRACING_TARGET_CONNECTION;

/// Custom setup procedure used to establish a new connection.
///
/// Used for pooled connections and for the dedicated connections held by
/// notification listeners.
///
/// See [`ManagerConfig`] and [`SetupCallback`] for more details.
///
/// [`ManagerConfig`]: diesel_async::pooled_connection::ManagerConfig
/// [`SetupCallback`]: diesel_async::pooled_connection::SetupCallback
pub fn setup_callback<C>(addr: &str) -> BoxFuture<'_, ConnectionResult<C>>
where
    C: AsyncConnection + 'static,
{
    let start = Instant::now();
    let masked_addr = mask_url(addr);

    tracing::debug!(
        target: TRACING_TARGET_CONNECTION,
        hook = "setup_callback",
        addr = %masked_addr,
        "Establishing new database connection"
    );

    async move {
        let result = C::establish(addr).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::debug!(
                    target: TRACING_TARGET_CONNECTION,
                    hook = "setup_callback",
                    addr = %masked_addr,
                    elapsed_ms = elapsed.as_millis(),
                    "Database connection established"
                );
            }
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET_CONNECTION,
                    hook = "setup_callback",
                    addr = %masked_addr,
                    elapsed_ms = elapsed.as_millis(),
                    error = %err,
                    "Failed to establish database connection"
                );
            }
        }

        result
    }
    .boxed()
}

/// Custom hook called before a connection is handed out again.
///
/// A connection released with an unfinished transaction (the closure of
/// [`PgClient::with_tx`] panicked, or its future was dropped) reports itself
/// as broken and is discarded here instead of being reused.
///
/// See [`PoolBuilder`] for more details.
///
/// [`PgClient::with_tx`]: crate::PgClient::with_tx
/// [`PoolBuilder`]: deadpool::managed::PoolBuilder
pub fn pre_recycle(conn: &mut AsyncPgConnection, metrics: &Metrics) -> HookResult<PoolError> {
    let is_broken = conn.is_broken();

    tracing::trace!(
        target: TRACING_TARGET_CONNECTION,
        hook = "pre_recycle",
        is_broken = is_broken,
        created_at = ?metrics.created,
        last_recycled = ?metrics.recycled,
        recycle_count = metrics.recycle_count,
        "Preparing to recycle connection"
    );

    if is_broken {
        tracing::warn!(
            target: TRACING_TARGET_CONNECTION,
            hook = "pre_recycle",
            recycle_count = metrics.recycle_count,
            "Discarding connection released in a non-idle state"
        );

        return Err(HookError::Message(
            "connection released in a non-idle state".into(),
        ));
    }

    Ok(())
}
