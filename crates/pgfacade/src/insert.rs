//! Multi-row INSERT / UPSERT statement assembly.
//!
//! One statement covers the whole batch. Every present field of record `i` is
//! bound under `<field>_<i>`, so keys are disjoint across records by construction:
//!
//! ```text
//! INSERT INTO test_tab AS _src(id,some_value) VALUES(:id_0,:someValue_0),(:id_1,:someValue_1)
//! ```

mod conflict;


pub use conflict::{UpsertProps, conflict_clause};

use crate::coerce::{bind_value, sql_fragment};
use crate::error::{FacadeError, FacadeResult};
use crate::ident::column_list;
use crate::schema::{FieldKind, FieldObjectDefinition};
use crate::value::{DbRecord, Params, Value};

/// Alias the target table is given, referenced by `COALESCE(_src.<col>, ...)`.
pub const SOURCE_ALIAS: &str = "_src";

/// A generated statement together with its named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub sql: String,
    pub params: Params,
}

/// Build the INSERT (or UPSERT, when `upsert.upsert_fields` is set) for `records`.
///
/// Returns `Ok(None)` for an empty batch: there is nothing to send.
///
/// The column list comes from the keys of the first record. Records in one batch
/// are expected to carry the same field set; a record missing a field simply
/// contributes fewer tokens to its row.
pub fn build_insert(
    definition: &FieldObjectDefinition,
    table: &str,
    records: &[DbRecord],
    upsert: &UpsertProps,
) -> FacadeResult<Option<InsertStatement>> {
    let Some(first) = records.first() else {
        return Ok(None);
    };
    if table.trim().is_empty() {
        return Err(FacadeError::validation("Table name cannot be empty"));
    }
    if first.is_empty() {
        return Err(FacadeError::validation(
            "First record has no fields; cannot derive a column list",
        ));
    }

    let mut params = Params::new();
    let mut rows = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let mut fragments = Vec::with_capacity(record.len());
        for (field, value) in record.iter() {
            let kind = definition.kind_of(field).ok_or_else(|| {
                FacadeError::validation(format!(
                    "Record {index} has field '{field}' which is not in the definition"
                ))
            })?;
            if matches!(value, Value::Now) && kind != FieldKind::Date {
                return Err(FacadeError::validation(format!(
                    "Record {index} sets field '{field}' to now, which only a date field accepts"
                )));
            }
            let key = format!("{field}_{index}");
            fragments.push(sql_fragment(kind, value, &key));
            if let Some(bound) = bind_value(kind, value) {
                params.insert(key, bound);
            }
        }
        rows.push(format!("({})", fragments.join(",")));
    }

    let mut sql = format!(
        "INSERT INTO {table} AS {SOURCE_ALIAS}({}) VALUES{}",
        column_list(first.keys()),
        rows.join(",")
    );
    if let Some(clause) = conflict_clause(definition, upsert)? {
        sql.push(' ');
        sql.push_str(&clause);
    }

    Ok(Some(InsertStatement { sql, params }))
}
