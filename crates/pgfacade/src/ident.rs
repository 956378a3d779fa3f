//! Field name to column identifier translation.
//!
//! Record fields use camelCase (`someValue`), columns use snake_case (`some_value`).

/// Translate a camelCase field name into its snake_case column identifier.
///
/// Every ASCII uppercase letter becomes `_` followed by its lowercase form.
/// Already-lowercase input is returned unchanged.
pub fn column_name(field: &str) -> String {
    let upper = field.bytes().filter(u8::is_ascii_uppercase).count();
    let mut out = String::with_capacity(field.len() + upper);
    for ch in field.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Comma-joined column identifiers for the given field names.
pub(crate) fn column_list<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields
        .into_iter()
        .map(column_name)
        .collect::<Vec<_>>()
        .join(",")
}
