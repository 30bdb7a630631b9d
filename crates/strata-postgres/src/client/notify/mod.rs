//! `LISTEN`/`NOTIFY` support.
//!
//! [`PgClient::listen`] starts one listener per channel. Each listener holds a
//! dedicated connection outside the pool, reconnects with [`Backoff`] after
//! failures, and copies every payload into the single-slot queue of each
//! [`Subscription`] without waiting on slow subscribers.
//!
//! [`PgClient::listen`]: crate::PgClient::listen

mod backoff;
mod listener;
mod subscription;

pub use backoff::Backoff;
pub(crate) use listener::Listener;
pub(crate) use subscription::SubscriberSet;
pub use subscription::Subscription;
