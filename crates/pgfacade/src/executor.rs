//! The raw query capability the facade is layered over.

use crate::error::FacadeResult;
use crate::value::{Params, RawRow};
use std::future::Future;
use std::sync::Arc;

/// Rows returned by a raw query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub records: Vec<RawRow>,
}

impl QueryOutput {
    pub fn new(records: Vec<RawRow>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Runs SQL text with `:name` bind parameters and returns loosely-typed rows.
///
/// Connection handling, timeouts and retries belong to the implementor. The
/// facade calls [`QueryExecutor::query`] exactly once per operation and never
/// retries.
pub trait QueryExecutor: Send + Sync {
    /// Execute `sql` with optional named parameters.
    fn query(
        &self,
        sql: &str,
        params: Option<&Params>,
    ) -> impl Future<Output = FacadeResult<QueryOutput>> + Send;
}

impl<E: QueryExecutor> QueryExecutor for &E {
    fn query(
        &self,
        sql: &str,
        params: Option<&Params>,
    ) -> impl Future<Output = FacadeResult<QueryOutput>> + Send {
        (**self).query(sql, params)
    }
}

impl<E: QueryExecutor> QueryExecutor for Arc<E> {
    fn query(
        &self,
        sql: &str,
        params: Option<&Params>,
    ) -> impl Future<Output = FacadeResult<QueryOutput>> + Send {
        (**self).query(sql, params)
    }
}
