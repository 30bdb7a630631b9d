//! Subscriber set and subscription handles.

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Each subscriber buffers at most one undelivered payload.
const SUBSCRIPTION_CAPACITY: usize = 1;

/// Subscribers of a single notification channel.
pub(crate) struct SubscriberSet {
    channel: String,
    inner: Mutex<SubscriberSetInner>,
}

#[derive(Default)]
struct SubscriberSetInner {
    next_id: u64,
    senders: Vec<(u64, mpsc::Sender<String>)>,
    closed: bool,
}

impl SubscriberSet {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            inner: Mutex::default(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SubscriberSetInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new subscriber, or returns `None` once closed.
    pub fn subscribe(self: &Arc<Self>) -> Option<Subscription> {
        let mut inner = self.lock();
        if inner.closed {
            return None;
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        inner.senders.push((id, sender));

        Some(Subscription {
            id,
            channel: self.channel.clone(),
            receiver,
            subscribers: Arc::clone(self),
        })
    }

    /// Offers `payload` to every subscriber without waiting.
    ///
    /// Subscribers whose slot is still full miss this payload. Returns the
    /// number of subscribers that received it.
    pub fn broadcast(&self, payload: &str) -> usize {
        let inner = self.lock();
        let mut delivered = 0;

        for (id, sender) in &inner.senders {
            match sender.try_send(payload.to_owned()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::trace!(
                        target: crate::TRACING_TARGET_LISTENER,
                        channel = %self.channel,
                        subscription = id,
                        "Subscriber slot full, dropping payload"
                    );
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }

        delivered
    }

    /// Removes a subscriber and closes its queue.
    pub fn unsubscribe(&self, id: u64) {
        self.lock().senders.retain(|(sub_id, _)| *sub_id != id);
    }

    /// Closes every queue and rejects new subscribers.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.senders.clear();
    }

    /// Returns the number of registered subscribers.
    pub fn len(&self) -> usize {
        self.lock().senders.len()
    }
}

/// A subscription to a notification channel.
///
/// Holds at most one pending payload; payloads sent while it is full are
/// missed by this subscription only. Yields `None` once the subscription is
/// cancelled or the client is closed and the pending payload is consumed.
/// Dropping the subscription cancels it.
pub struct Subscription {
    id: u64,
    channel: String,
    receiver: mpsc::Receiver<String>,
    subscribers: Arc<SubscriberSet>,
}

impl Subscription {
    /// Returns the channel name.
    #[inline]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Waits for the next payload.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Returns the pending payload, if any, without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }

    /// Stops receiving payloads.
    ///
    /// A payload already buffered can still be received. Calling it again has
    /// no effect.
    pub fn cancel(&self) {
        self.subscribers.unsubscribe(self.id);
    }
}

impl Stream for Subscription {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}
