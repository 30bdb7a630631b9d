//! Registry of the advisory locks taken by this crate.
//!
//! PostgreSQL advisory locks are keyed by integers in a single namespace
//! shared by every session of a database. Every lock taken by this crate is
//! declared here; a new lock consumer must add an entry with a sub-id that is
//! not already listed in [`AdvisoryLock::RESERVED`].

use std::fmt;

/// A two-part advisory lock key: `(namespace, id)`.
///
/// Both parts are 32-bit integers, matching the two-argument forms of
/// `pg_advisory_lock` and `pg_advisory_xact_lock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdvisoryLock {
    /// Namespace shared by every lock of this crate.
    pub namespace: i32,
    /// Lock identifier within the namespace.
    pub id: i32,
}

impl AdvisoryLock {
    /// Namespace reserved for this crate.
    pub const NAMESPACE: i32 = 0x0100;

    /// Serializes schema migrations across every process using the database.
    pub const MIGRATIONS: Self = Self::new(0x0001);

    /// Every lock taken by this crate.
    pub const RESERVED: &[Self] = &[Self::MIGRATIONS];

    /// Creates a lock key inside the crate namespace.
    pub const fn new(id: i32) -> Self {
        Self {
            namespace: Self::NAMESPACE,
            id,
        }
    }
}

impl fmt::Display for AdvisoryLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}:{:#06x}", self.namespace, self.id)
    }
}
