use super::SOURCE_ALIAS;
use crate::error::{FacadeError, FacadeResult};
use crate::ident::column_name;
use crate::schema::FieldObjectDefinition;

/// Conflict handling for a multi-row insert.
///
/// `upsert_fields` names the conflict key as **column identifiers** (`id_a`, not
/// `idA`). They are emitted verbatim inside `ON CONFLICT(...)` and must each match
/// the column of some field in the definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertProps {
    pub upsert_fields: Option<Vec<String>>,
    /// Keep the stored value unless it is NULL.
    pub only_replace_nulls: bool,
}

impl UpsertProps {
    /// Plain insert, no conflict clause.
    pub fn none() -> Self {
        Self::default()
    }

    /// Upsert on the given conflict key columns.
    pub fn on<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            upsert_fields: Some(columns.into_iter().map(Into::into).collect()),
            only_replace_nulls: false,
        }
    }

    pub fn only_replace_nulls(mut self) -> Self {
        self.only_replace_nulls = true;
        self
    }
}

/// Build `ON CONFLICT(<key>) DO UPDATE SET ...`, or `None` without a conflict key.
///
/// Every definition field outside the key is assigned from `EXCLUDED`, or through
/// `COALESCE(_src.<col>,EXCLUDED.<col>)` with `only_replace_nulls`. When every
/// field is part of the key there is nothing to update and `DO NOTHING` is used.
pub fn conflict_clause(
    definition: &FieldObjectDefinition,
    props: &UpsertProps,
) -> FacadeResult<Option<String>> {
    let Some(keys) = props.upsert_fields.as_deref() else {
        return Ok(None);
    };
    if keys.is_empty() {
        return Err(FacadeError::validation(
            "Upsert requires at least one conflict field",
        ));
    }

    let columns: Vec<String> = definition.column_names().collect();
    if let Some(unknown) = keys.iter().find(|k| !columns.contains(k)) {
        return Err(FacadeError::validation(format!(
            "Conflict field '{unknown}' does not name a column of the definition (expected one of: {})",
            columns.join(", ")
        )));
    }

    let assignments: Vec<String> = definition
        .names()
        .map(column_name)
        .filter(|column| !keys.contains(column))
        .map(|column| {
            if props.only_replace_nulls {
                format!("{column} = COALESCE({SOURCE_ALIAS}.{column},EXCLUDED.{column})")
            } else {
                format!("{column} = EXCLUDED.{column}")
            }
        })
        .collect();

    let target = keys.join(",");
    if assignments.is_empty() {
        return Ok(Some(format!("ON CONFLICT({target}) DO NOTHING")));
    }
    Ok(Some(format!(
        "ON CONFLICT({target}) DO UPDATE SET {}",
        assignments.join(",")
    )))
}
