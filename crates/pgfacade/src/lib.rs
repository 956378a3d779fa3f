//! # pgfacade
//!
//! A typed facade over a raw SQL executor for PostgreSQL.
//!
//! ## Features
//!
//! - **Schema-described records**: a [`FieldObjectDefinition`] fixes the kind,
//!   nullability and default of every field
//! - **One statement per batch**: [`TypedFacade::multi_insert`] and
//!   [`TypedFacade::multi_upsert`] build a single multi-row `INSERT` with
//!   `:field_index` bind parameters
//! - **Big integers without precision loss**: bound as decimal text and cast back
//!   with `CAST(... AS BIGINT)`
//! - **Database clock**: a date field holding [`Value::Now`] is written as `now()`
//! - **Typed reads**: [`TypedFacade::select`] and [`TypedFacade::typed_query`]
//!   convert raw rows into records
//! - **Forensic errors**: a failed batch reports the SQL and values that were sent
//!
//! ```ignore
//! use pgfacade::{DbRecord, FieldDef, FieldObjectDefinition, TypedFacade, UpsertProps};
//!
//! let transfers = FieldObjectDefinition::build([
//!     ("id", FieldDef::integer().not_null()),
//!     ("amount", FieldDef::big_integer().not_null()),
//!     ("createdAt", FieldDef::date().default_now()),
//! ])?;
//!
//! let db = TypedFacade::new(pgfacade::postgres::connect(&url, &Default::default()).await?);
//! db.multi_upsert(&transfers, "transfers", records, &UpsertProps::on(["id"])).await?;
//! let rows = db.select(&transfers, "transfers WHERE amount > 0", None).await?;
//! ```

pub mod coerce;
pub mod config;
pub mod error;
pub mod executor;
pub mod facade;
pub mod handler;
pub mod ident;
pub mod insert;
pub mod postgres;
pub mod schema;
pub mod unmarshal;
pub mod value;

pub use config::{ConnectionTimeouts, FacadeConfig};
pub use error::{FacadeError, FacadeResult};
pub use executor::{QueryExecutor, QueryOutput};
pub use facade::{TypedFacade, TypedOutput};
pub use handler::{
    ApiFunction, ApiList, ArgShape, Argument, CONNECTED, ImplementationProps, InputProps,
    IntegrationHandler, ReportedEvent,
};
pub use ident::column_name;
pub use insert::{InsertStatement, UpsertProps, build_insert};
pub use postgres::PgExecutor;
pub use schema::{FieldDef, FieldDefault, FieldKind, FieldObjectDefinition};
pub use unmarshal::{unmarshal, unmarshal_many, unmarshal_value};
pub use value::{DbRecord, Params, RawRow, Value, stringify_with_bigints};
