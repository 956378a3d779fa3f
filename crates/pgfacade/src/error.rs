//! Error types for pgfacade

use std::time::Duration;
use thiserror::Error;

/// Result type alias for pgfacade operations
pub type FacadeResult<T> = Result<T, FacadeError>;

/// Error types for facade operations
#[derive(Debug, Error)]
pub enum FacadeError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error reported by tokio-postgres
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Query execution error reported by a custom executor
    #[error("Executor error: {0}")]
    Executor(String),

    /// Raw value could not be converted into the field's kind
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Input rejected before any I/O
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(Duration),

    /// The executor failed while running a generated INSERT/UPSERT.
    ///
    /// The message carries the statement and the bound values so a failed batch
    /// can be reproduced from the log alone.
    #[error(
        "Error for the executed insert query:\n{sql},\nvalues: {values}\nOriginal error: {source},\nError details: {details}"
    )]
    InsertFailed {
        sql: String,
        values: String,
        details: String,
        #[source]
        source: Box<FacadeError>,
    },

    /// No implementation registered for the dispatched function
    #[error("Function not implemented: {api}.{function}")]
    NotImplemented { api: String, function: String },
}

impl FacadeError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an executor error
    pub fn executor(message: impl Into<String>) -> Self {
        Self::Executor(message.into())
    }

    /// Wrap an executor failure with the statement that triggered it.
    pub fn insert_failed(sql: impl Into<String>, values: impl Into<String>, source: Self) -> Self {
        Self::InsertFailed {
            sql: sql.into(),
            values: values.into(),
            details: format!("{source:?}"),
            source: Box::new(source),
        }
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a wrapped insert failure
    pub fn is_insert_failed(&self) -> bool {
        matches!(self, Self::InsertFailed { .. })
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Parse a tokio_postgres error into a connection or query error
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            return Self::Connection(err.to_string());
        }
        Self::Query(err)
    }
}

impl From<serde_json::Error> for FacadeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
