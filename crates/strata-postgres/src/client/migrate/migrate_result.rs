//! Type definitions for database migration operations.
//!
//! This module contains data structures used to represent the state and
//! results of database migration operations.

use std::time::Duration;

/// Migration status information for one schema.
///
/// # Example
///
/// ```rust
/// use strata_postgres::MigrationStatus;
///
/// fn print_status(status: &MigrationStatus) {
///     println!("{}: {}/{} migrations applied",
///              status.schema, status.applied_migrations(), status.total_migrations());
///
///     if !status.is_up_to_date() {
///         println!("{} migrations pending", status.pending_migrations());
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Schema the status describes
    pub schema: String,
    /// Applied migration versions in chronological order
    pub applied_versions: Vec<String>,
    /// Pending migration versions in chronological order
    pub pending_versions: Vec<String>,
}

impl MigrationStatus {
    /// Creates a new migration status.
    pub fn new(
        schema: impl Into<String>,
        applied_versions: impl Into<Vec<String>>,
        pending_versions: impl Into<Vec<String>>,
    ) -> Self {
        Self {
            schema: schema.into(),
            applied_versions: applied_versions.into(),
            pending_versions: pending_versions.into(),
        }
    }

    /// Returns the progress ratio (0.0 to 1.0) of applied migrations.
    pub fn progress_ratio(&self) -> f64 {
        let total_migrations = self.total_migrations();
        if total_migrations == 0 {
            1.0
        } else {
            self.applied_migrations() as f64 / total_migrations as f64
        }
    }

    /// Returns the last applied migration version, if any.
    pub fn last_applied_version(&self) -> Option<&str> {
        self.applied_versions.last().map(|s| s.as_str())
    }

    /// Returns the next pending migration version, if any.
    pub fn next_pending_version(&self) -> Option<&str> {
        self.pending_versions.first().map(|s| s.as_str())
    }

    /// Returns the number of applied migrations.
    #[inline]
    pub fn applied_migrations(&self) -> usize {
        self.applied_versions.len()
    }

    /// Returns the number of pending migrations.
    #[inline]
    pub fn pending_migrations(&self) -> usize {
        self.pending_versions.len()
    }

    /// Returns the total number of migrations.
    #[inline]
    pub fn total_migrations(&self) -> usize {
        self.applied_migrations() + self.pending_migrations()
    }

    /// Returns true if all migrations have been applied.
    #[inline]
    pub fn is_up_to_date(&self) -> bool {
        self.pending_versions.is_empty()
    }
}

/// Outcome of a successful schema update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationResult {
    /// Schema that was updated
    pub schema: String,
    /// Total duration of the update
    pub duration: Duration,
    /// Versions applied by this update, in order
    pub processed_versions: Vec<String>,
}

impl MigrationResult {
    /// Creates a migration result.
    pub fn new(
        schema: impl Into<String>,
        duration: Duration,
        processed_versions: Vec<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            duration,
            processed_versions,
        }
    }

    /// Returns the average time per migration processed.
    pub fn average_time_per_migration(&self) -> Option<Duration> {
        let processed = u32::try_from(self.processed_versions.len()).ok()?;
        if processed > 0 {
            Some(self.duration / processed)
        } else {
            None
        }
    }

    /// Returns whether no migration was applied.
    pub fn is_no_op(&self) -> bool {
        self.processed_versions.is_empty()
    }

    /// Returns the last processed migration version, if any.
    pub fn last_processed_version(&self) -> Option<&str> {
        self.processed_versions.last().map(|s| s.as_str())
    }
}
