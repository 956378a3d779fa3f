//! Configuration values.
//!
//! Nothing here is global: each value is passed to whatever owns the concern
//! (the executor for timeouts, the facade for SQL logging).

use std::time::Duration;
use tracing::Level;

/// Connection-level timeouts and retry budget for an executor.
///
/// Defaults: 30s per request, 10s to connect, 3 connect retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTimeouts {
    /// Maximum time a single query may take.
    pub request_timeout: Duration,
    /// Maximum time to establish a connection.
    pub connect_timeout: Duration,
    /// Extra connection attempts after the first failure.
    pub max_retries: u32,
}

impl Default for ConnectionTimeouts {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(30_000),
            connect_timeout: Duration::from_millis(10_000),
            max_retries: 3,
        }
    }
}

impl ConnectionTimeouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// Facade-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacadeConfig {
    /// Tracing level for the SQL event emitted before each executor call.
    pub sql_log_level: Level,
    /// Truncate logged SQL (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            sql_log_level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl FacadeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn sql_log_level(mut self, level: Level) -> Self {
        self.sql_log_level = level;
        self
    }

    /// Set maximum SQL length to log.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
