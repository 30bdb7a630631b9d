//! Contains SQL quoting helpers and the advisory lock registry.

mod advisory_lock;
mod quote;

pub use advisory_lock::AdvisoryLock;
pub use quote::{quote_channel, quote_identifier, quote_string};
