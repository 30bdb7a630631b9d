/// Connection pool status information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgPoolStatus {
    /// Maximum number of connections in the pool
    pub max_connections: usize,
    /// Current number of connections in the pool
    pub connections: usize,
    /// Number of idle connections
    pub idle_connections: usize,
    /// Number of requests waiting for connections
    pub waiting: usize,
}

impl PgPoolStatus {
    /// Returns the number of connections currently checked out.
    #[inline]
    pub fn acquired_connections(&self) -> usize {
        self.connections.saturating_sub(self.idle_connections)
    }

    /// Returns the utilization percentage of the pool (0.0 to 1.0).
    #[inline]
    pub fn utilization(&self) -> f64 {
        if self.max_connections == 0 {
            0.0
        } else {
            self.acquired_connections() as f64 / self.max_connections as f64
        }
    }

    /// Returns whether the pool is under pressure (high utilization or waiting requests).
    #[inline]
    pub fn is_under_pressure(&self) -> bool {
        self.waiting > 0 || self.utilization() > 0.8
    }
}

impl From<deadpool::Status> for PgPoolStatus {
    fn from(status: deadpool::Status) -> Self {
        Self {
            max_connections: status.max_size,
            connections: status.size,
            idle_connections: status.available,
            waiting: status.waiting,
        }
    }
}
