//! Reconnecting `LISTEN` session for a single channel.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use diesel_async::AsyncPgConnection;
use futures::StreamExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Backoff, SubscriberSet, Subscription};
use crate::client::custom_hooks;
use crate::{PgConnExt, PgError, PgResult, TRACING_TARGET_LISTENER};

/// Owns the background task listening on one channel and its subscribers.
pub(crate) struct Listener {
    subscribers: Arc<SubscriberSet>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Listener {
    /// Starts listening on `channel` on the current Tokio runtime.
    pub fn spawn(
        channel: &str,
        connection_url: String,
        connect_timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> PgResult<Self> {
        let runtime = Handle::try_current().map_err(|err| {
            PgError::Unexpected(format!("listen requires a Tokio runtime: {}", err).into())
        })?;

        let subscribers = Arc::new(SubscriberSet::new(channel));
        let worker = ListenerWorker {
            channel: channel.to_owned(),
            connection_url,
            connect_timeout,
            subscribers: Arc::clone(&subscribers),
            cancel: cancel.clone(),
        };

        tracing::debug!(target: TRACING_TARGET_LISTENER, channel, "Starting listener");
        let task = runtime.spawn(worker.run());

        Ok(Self {
            subscribers,
            cancel,
            task,
        })
    }

    /// Registers a new subscription, or returns `None` once closed.
    pub fn subscribe(&self) -> Option<Subscription> {
        self.subscribers.subscribe()
    }

    /// Stops the background task and closes every subscription.
    pub async fn close(self) {
        self.cancel.cancel();

        if let Err(err) = self.task.await {
            tracing::error!(
                target: TRACING_TARGET_LISTENER,
                error = %err,
                "Listener task terminated abnormally"
            );
        }

        self.subscribers.close();
    }
}

struct ListenerWorker {
    channel: String,
    connection_url: String,
    connect_timeout: Option<Duration>,
    subscribers: Arc<SubscriberSet>,
    cancel: CancellationToken,
}

impl ListenerWorker {
    async fn run(self) {
        let mut backoff = Backoff::default();

        loop {
            let delay = backoff.delay();
            if !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let connected = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.connect() => result,
            };

            let mut conn = match connected {
                Ok(conn) => conn,
                Err(err) => {
                    let delay = backoff.increase();
                    tracing::warn!(
                        target: TRACING_TARGET_LISTENER,
                        channel = %self.channel,
                        error = %err,
                        retry_in = ?delay,
                        "Failed to subscribe to notification channel"
                    );
                    continue;
                }
            };

            backoff.reset();
            tracing::info!(
                target: TRACING_TARGET_LISTENER,
                channel = %self.channel,
                "Listening for notifications"
            );

            if !self.receive(&mut conn).await {
                break;
            }

            let delay = backoff.increase();
            tracing::debug!(
                target: TRACING_TARGET_LISTENER,
                channel = %self.channel,
                retry_in = ?delay,
                "Reconnecting notification listener"
            );
        }

        tracing::debug!(
            target: TRACING_TARGET_LISTENER,
            channel = %self.channel,
            "Listener stopped"
        );
    }

    /// Opens a dedicated connection and subscribes it to the channel.
    async fn connect(&self) -> PgResult<AsyncPgConnection> {
        let establish = custom_hooks::setup_callback::<AsyncPgConnection>(&self.connection_url);
        let mut conn = match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, establish)
                .await
                .map_err(|_| PgError::Timeout(deadpool::managed::TimeoutType::Create))??,
            None => establish.await?,
        };

        conn.listen(&self.channel).await?;
        Ok(conn)
    }

    /// Forwards notifications until the connection fails.
    ///
    /// Returns `false` when cancelled.
    async fn receive(&self, conn: &mut AsyncPgConnection) -> bool {
        let mut notifications = pin!(conn.notifications_stream());

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                next = notifications.next() => next,
            };

            match next {
                Some(Ok(notification)) => {
                    let delivered = self.subscribers.broadcast(&notification.payload);
                    tracing::trace!(
                        target: TRACING_TARGET_LISTENER,
                        channel = %self.channel,
                        delivered,
                        subscribers = self.subscribers.len(),
                        "Notification received"
                    );
                }
                Some(Err(err)) => {
                    tracing::warn!(
                        target: TRACING_TARGET_LISTENER,
                        channel = %self.channel,
                        error = %err,
                        "Notification stream failed"
                    );
                    return true;
                }
                None => {
                    tracing::warn!(
                        target: TRACING_TARGET_LISTENER,
                        channel = %self.channel,
                        "Notification stream ended"
                    );
                    return true;
                }
            }
        }
    }
}
