//! Typed facade over a [`QueryExecutor`].
//!
//! ```ignore
//! use pgfacade::{DbRecord, FieldDef, FieldObjectDefinition, TypedFacade, UpsertProps};
//!
//! let accounts = FieldObjectDefinition::build([
//!     ("id", FieldDef::integer().not_null()),
//!     ("ownerName", FieldDef::string()),
//! ])?;
//! let db = TypedFacade::new(client);
//!
//! db.multi_upsert(
//!     &accounts,
//!     "accounts",
//!     vec![DbRecord::new().with("id", 1).with("ownerName", "ann")],
//!     &UpsertProps::on(["id"]),
//! )
//! .await?;
//!
//! let rows = db.select(&accounts, "accounts WHERE id > 0", None).await?;
//! ```

use crate::config::FacadeConfig;
use crate::error::{FacadeError, FacadeResult};
use crate::executor::{QueryExecutor, QueryOutput};
use crate::ident::column_list;
use crate::insert::{InsertStatement, UpsertProps, build_insert};
use crate::schema::FieldObjectDefinition;
use crate::unmarshal::unmarshal;
use crate::value::{DbRecord, Params, stringify_with_bigints};
use tracing::Level;

/// Rows converted into typed records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedOutput {
    pub records: Vec<DbRecord>,
}

/// Stateless typed layer: builds statements, delegates to the executor once, and
/// converts results. Safe to share between tasks when the executor is.
#[derive(Debug, Clone)]
pub struct TypedFacade<E> {
    db: E,
    config: FacadeConfig,
}

impl<E: QueryExecutor> TypedFacade<E> {
    pub fn new(db: E) -> Self {
        Self {
            db,
            config: FacadeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: FacadeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &FacadeConfig {
        &self.config
    }

    /// The wrapped executor.
    pub fn executor(&self) -> &E {
        &self.db
    }

    /// Untyped passthrough.
    pub async fn query(&self, sql: &str, params: Option<&Params>) -> FacadeResult<QueryOutput> {
        self.log_sql("query", sql, params.map_or(0, Params::len));
        self.db.query(sql, params).await
    }

    /// Run a query and convert every row against `definition`.
    ///
    /// Executor errors are returned unchanged.
    pub async fn typed_query(
        &self,
        definition: &FieldObjectDefinition,
        sql: &str,
        params: Option<&Params>,
    ) -> FacadeResult<TypedOutput> {
        let output = self.query(sql, params).await?;
        let records = output
            .records
            .iter()
            .map(|row| unmarshal(definition, row))
            .collect::<FacadeResult<Vec<_>>>()?;
        Ok(TypedOutput { records })
    }

    /// `SELECT <every definition column> FROM <table_query>`.
    ///
    /// `table_query` is appended verbatim, so it may carry `WHERE`/`ORDER BY` text
    /// referencing `:name` parameters from `params`.
    pub async fn select(
        &self,
        definition: &FieldObjectDefinition,
        table_query: &str,
        params: Option<&Params>,
    ) -> FacadeResult<Vec<DbRecord>> {
        let sql = format!("SELECT {} FROM {table_query}", column_list(definition.names()));
        Ok(self.typed_query(definition, &sql, params).await?.records)
    }

    /// Insert `records` into `table` with a single statement.
    ///
    /// An empty batch returns immediately without touching the executor. On
    /// success the input records are handed back unchanged.
    pub async fn multi_insert(
        &self,
        definition: &FieldObjectDefinition,
        table: &str,
        records: Vec<DbRecord>,
    ) -> FacadeResult<Vec<DbRecord>> {
        self.multi_upsert(definition, table, records, &UpsertProps::none())
            .await
    }

    /// Insert `records`, resolving conflicts as described by `upsert`.
    ///
    /// Executor failures come back as [`FacadeError::InsertFailed`] carrying the
    /// generated SQL and values.
    pub async fn multi_upsert(
        &self,
        definition: &FieldObjectDefinition,
        table: &str,
        records: Vec<DbRecord>,
        upsert: &UpsertProps,
    ) -> FacadeResult<Vec<DbRecord>> {
        let Some(InsertStatement { sql, params }) =
            build_insert(definition, table, &records, upsert)?
        else {
            return Ok(records);
        };

        let operation = if upsert.upsert_fields.is_some() {
            "upsert"
        } else {
            "insert"
        };
        self.log_sql(operation, &sql, params.len());

        match self.db.query(&sql, Some(&params)).await {
            Ok(_) => Ok(records),
            Err(err) => {
                tracing::warn!(
                    target: "pgfacade.sql",
                    operation,
                    table,
                    rows = records.len(),
                    error = %err,
                    "batch statement failed"
                );
                Err(FacadeError::insert_failed(
                    sql,
                    stringify_with_bigints(&params),
                    err,
                ))
            }
        }
    }

    fn log_sql(&self, operation: &str, sql: &str, param_count: usize) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN => tracing::warn!($($field)*),
                    Level::INFO => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.config.truncate_sql(sql);
        emit_at_level!(
            self.config.sql_log_level,
            target: "pgfacade.sql",
            operation,
            param_count,
            sql = %sql,
        );
    }
}
