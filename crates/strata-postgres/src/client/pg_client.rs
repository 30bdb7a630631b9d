use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use deadpool::managed::{Hook, Pool};
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, ManagerConfig};
use diesel_async::scoped_futures::ScopedBoxFuture;
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, RunQueryDsl, TransactionManager};
use tokio_util::sync::CancellationToken;

use super::custom_hooks;
use super::migrate::PgClientMigrationExt;
use super::notify::{Listener, Subscription};
use crate::{
    ConnectionPool, PgConfig, PgConnExt, PgError, PgPoolStatus, PgResult, PooledConnection,
    TRACING_TARGET_CLIENT, TRACING_TARGET_CONNECTION,
};

/// Acquisitions slower than this are logged as a warning.
const SLOW_ACQUISITION: Duration = Duration::from_millis(100);

/// High-level database client that manages connections, migrations and
/// notification listeners.
///
/// Cloning is cheap and every clone shares the same pool and listeners.
/// [`PgClient::close`] shuts all of them down.
#[derive(Clone)]
pub struct PgClient {
    inner: Arc<PgClientInner>,
}

/// Inner data for PgClient
struct PgClientInner {
    pool: ConnectionPool,
    config: PgConfig,
    listeners: Mutex<HashMap<String, Listener>>,
    shutdown: CancellationToken,
}

impl PgClient {
    /// Creates a new database client with the provided configuration.
    ///
    /// This builds the connection pool without opening any connection and
    /// does not validate the configuration; see [`PgConfig::build`].
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be built.
    #[tracing::instrument(
        skip(config),
        target = TRACING_TARGET_CLIENT,
        fields(database_url = %config.database_url_masked())
    )]
    pub fn new(config: PgConfig) -> PgResult<Self> {
        tracing::info!(target: TRACING_TARGET_CLIENT, "Initializing database client");

        let mut manager_config = ManagerConfig::default();
        manager_config.custom_setup = Box::new(custom_hooks::setup_callback);
        let manager =
            AsyncDieselConnectionManager::new_with_config(config.connection_url(), manager_config);

        let acquisition_timeout = config.acquisition_timeout();
        let pool = Pool::builder(manager)
            .max_size(config.postgres_max_connections as usize)
            .wait_timeout(Some(acquisition_timeout))
            .create_timeout(Some(config.connect_timeout().unwrap_or(acquisition_timeout)))
            .recycle_timeout(Some(acquisition_timeout))
            .runtime(deadpool::Runtime::Tokio1)
            .pre_recycle(Hook::sync_fn(custom_hooks::pre_recycle))
            .build()
            .map_err(|e| {
                tracing::error!(
                    target: TRACING_TARGET_CLIENT,
                    error = %e,
                    "Failed to create connection pool"
                );
                PgError::Unexpected(format!("Failed to build connection pool: {}", e).into())
            })?;

        Ok(Self {
            inner: Arc::new(PgClientInner {
                pool,
                config,
                listeners: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// Creates a ready-to-use database client.
    ///
    /// Validates the configuration, builds the pool, verifies connectivity and
    /// applies pending migrations for every configured schema when a schema
    /// directory is set. The client is closed again if any step fails.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    ///
    /// - The configuration is invalid
    /// - The database cannot be reached
    /// - A migration fails to load or apply
    #[tracing::instrument(
        skip(config),
        target = TRACING_TARGET_CLIENT,
        fields(database_url = %config.database_url_masked())
    )]
    pub async fn connect(config: PgConfig) -> PgResult<Self> {
        config.validate()?;
        let this = Self::new(config)?;

        if let Err(err) = this.initialize().await {
            tracing::error!(
                target: TRACING_TARGET_CLIENT,
                error = %err,
                "Database client initialization failed"
            );
            this.close().await;
            return Err(err);
        }

        tracing::info!(
            target: TRACING_TARGET_CLIENT,
            max_connections = this.inner.config.postgres_max_connections,
            acquisition_timeout_ms = this.inner.config.postgres_acquisition_timeout_ms,
            "Database client initialized successfully"
        );

        Ok(this)
    }

    async fn initialize(&self) -> PgResult<()> {
        self.ping().await?;

        if self.inner.config.schema_directory().is_some() {
            self.update_schemas().await?;
        }

        Ok(())
    }

    /// Verifies connectivity by running `SELECT 1` on a pooled connection.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_CONNECTION)]
    pub async fn ping(&self) -> PgResult<()> {
        #[derive(diesel::QueryableByName)]
        struct ConnectivityTest {
            #[diesel(sql_type = diesel::sql_types::Integer)]
            #[allow(dead_code)]
            result: i32,
        }

        let mut conn = self.acquire().await?;
        let _: ConnectivityTest = diesel::sql_query("SELECT 1 AS result")
            .get_result(&mut *conn)
            .await
            .map_err(|e| {
                tracing::error!(
                    target: TRACING_TARGET_CONNECTION,
                    error = %e,
                    "Database connectivity test failed"
                );
                PgError::from(e)
            })?;

        Ok(())
    }

    /// Acquires a connection from the pool.
    ///
    /// Waits up to the configured acquisition timeout. The connection is
    /// returned to the pool when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PgError::NoConnectionAvailable`] if the timeout elapses, or
    /// [`PgError::Closed`] once the client has been closed.
    pub async fn acquire(&self) -> PgResult<PooledConnection> {
        let start = Instant::now();
        let conn = self.inner.pool.get().await.map_err(|e| {
            let err = PgError::from(e);
            tracing::error!(
                target: TRACING_TARGET_CONNECTION,
                error = %err,
                elapsed = ?start.elapsed(),
                "Failed to acquire connection from pool"
            );
            err
        })?;

        let elapsed = start.elapsed();
        if elapsed > SLOW_ACQUISITION {
            tracing::warn!(
                target: TRACING_TARGET_CONNECTION,
                elapsed = ?elapsed,
                "Connection acquisition took longer than expected"
            );
        }

        Ok(conn)
    }

    /// Runs `f` with a pooled connection.
    ///
    /// The connection is released when `f` completes, fails or panics. A
    /// connection released with an open transaction is discarded by the pool.
    ///
    /// ```rust,no_run
    /// use diesel_async::RunQueryDsl;
    /// use strata_postgres::scoped_futures::ScopedFutureExt;
    /// use strata_postgres::{PgClient, PgError};
    ///
    /// # async fn example(client: PgClient) -> Result<(), PgError> {
    /// let deleted = client
    ///     .with_conn(|conn| {
    ///         async move {
    ///             let n = diesel::sql_query("DELETE FROM sessions WHERE expired")
    ///                 .execute(conn)
    ///                 .await?;
    ///             Ok::<_, PgError>(n)
    ///         }
    ///         .scope_boxed()
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or the acquisition error converted into `E`.
    pub async fn with_conn<'a, T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: for<'r> FnOnce(&'r mut AsyncPgConnection) -> ScopedBoxFuture<'a, 'r, Result<T, E>>
            + Send
            + 'a,
        T: Send + 'a,
        E: From<PgError> + Send + 'a,
    {
        let mut conn = self.acquire().await?;
        f(&mut *conn).await
    }

    /// Runs `f` inside a transaction on a pooled connection.
    ///
    /// Commits when `f` returns `Ok` and returns the commit error, if any.
    /// Rolls back when `f` returns `Err` and returns that error; a failed
    /// rollback is logged and never replaces it. A panic in `f` propagates
    /// without commit or rollback, and the connection is discarded.
    ///
    /// Calls do not nest: a `with_tx` inside `f` takes a second connection
    /// from the pool, and fails with [`PgError::NoConnectionAvailable`] when
    /// the pool is exhausted.
    pub async fn with_tx<'a, T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: for<'r> FnOnce(&'r mut AsyncPgConnection) -> ScopedBoxFuture<'a, 'r, Result<T, E>>
            + Send
            + 'a,
        T: Send + 'a,
        E: From<PgError> + Send + 'a,
    {
        type Tm = AnsiTransactionManager;

        let mut conn = self.acquire().await?;
        let conn: &mut AsyncPgConnection = &mut conn;

        <Tm as TransactionManager<AsyncPgConnection>>::begin_transaction(conn)
            .await
            .map_err(PgError::from)?;

        match f(&mut *conn).await {
            Ok(value) => {
                <Tm as TransactionManager<AsyncPgConnection>>::commit_transaction(conn)
                    .await
                    .map_err(PgError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) =
                    <Tm as TransactionManager<AsyncPgConnection>>::rollback_transaction(conn).await
                {
                    tracing::error!(
                        target: TRACING_TARGET_CONNECTION,
                        error = %rollback_err,
                        "Failed to roll back transaction"
                    );
                }
                Err(err)
            }
        }
    }

    /// Subscribes to notifications sent on `channel`.
    ///
    /// The first call for a channel starts a listener that holds a dedicated
    /// connection and reconnects with backoff until the client is closed;
    /// later calls share it. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PgError::Closed`] once the client has been closed.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_CLIENT)]
    pub fn listen(&self, channel: &str) -> PgResult<Subscription> {
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.inner.shutdown.is_cancelled() {
            return Err(PgError::Closed);
        }

        let listener = match listeners.entry(channel.to_owned()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let listener = Listener::spawn(
                    channel,
                    self.inner.config.connection_url(),
                    self.inner.config.connect_timeout(),
                    self.inner.shutdown.child_token(),
                )?;
                entry.insert(listener)
            }
        };

        listener.subscribe().ok_or(PgError::Closed)
    }

    /// Sends `payload` to every session listening on `channel`.
    #[tracing::instrument(skip(self, payload), target = TRACING_TARGET_CLIENT)]
    pub async fn notify(&self, channel: &str, payload: &str) -> PgResult<()> {
        let mut conn = self.acquire().await?;
        conn.notify(channel, payload).await
    }

    /// Gets the current pool status and statistics.
    #[inline]
    pub fn pool_status(&self) -> PgPoolStatus {
        self.inner.pool.status().into()
    }

    /// Closes every idle pooled connection and returns how many were closed.
    ///
    /// Connections in use are unaffected. New connections are opened on
    /// demand, so session state cached by the server (such as prepared
    /// statements planned against an older schema) is dropped.
    pub fn close_idle_connections(&self) -> usize {
        let closed = self.inner.pool.retain(|_, _| false).removed.len();

        tracing::debug!(
            target: TRACING_TARGET_CONNECTION,
            closed,
            "Closed idle pooled connections"
        );

        closed
    }

    /// Gets the database configuration used by this client.
    #[inline]
    pub fn config(&self) -> &PgConfig {
        &self.inner.config
    }

    /// Returns whether [`PgClient::close`] has been called.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Closes the client.
    ///
    /// Cancels every listener, waits for their tasks to finish and closes
    /// their subscriptions, then closes the pool. Later acquisitions fail
    /// with [`PgError::Closed`]. Calling it again has no effect.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_CLIENT)]
    pub async fn close(&self) {
        self.inner.shutdown.cancel();

        let listeners: Vec<Listener> = {
            let mut listeners = self
                .inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            listeners.drain().map(|(_, listener)| listener).collect()
        };

        for listener in listeners {
            listener.close().await;
        }

        self.inner.pool.close();
        tracing::info!(target: TRACING_TARGET_CLIENT, "Database client closed");
    }
}

impl fmt::Debug for PgClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pool_status = self.pool_status();
        let listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();

        f.debug_struct("PgClient")
            .field("database_url", &self.inner.config.database_url_masked())
            .field("pool_max_connections", &pool_status.max_connections)
            .field("pool_connections", &pool_status.connections)
            .field("pool_idle_connections", &pool_status.idle_connections)
            .field("pool_waiting", &pool_status.waiting)
            .field("listeners", &listeners)
            .field("closed", &self.is_closed())
            .finish()
    }
}
