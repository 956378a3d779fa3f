//! Per-kind rules for turning a record value into a bind parameter and a VALUES token.

use crate::schema::FieldKind;
use crate::value::Value;
use std::borrow::Cow;

/// Literal emitted for a date field holding [`Value::Now`].
pub const NOW_SQL: &str = "now()";

/// Whether this value is the "now" sentinel in a field of this kind.
pub fn is_now_sentinel(kind: FieldKind, value: &Value) -> bool {
    matches!((kind, value), (FieldKind::Date, Value::Now))
}

/// The value bound under the parameter key, or `None` when the field contributes
/// no parameter (the "now" sentinel).
///
/// Big integers are sent as decimal strings so executors without native
/// arbitrary-precision support can carry them; the statement casts them back.
pub fn bind_value(kind: FieldKind, value: &Value) -> Option<Value> {
    if is_now_sentinel(kind, value) {
        return None;
    }
    match (kind, value) {
        (FieldKind::BigInteger, Value::BigInteger(v)) => Some(Value::String(v.to_string())),
        (FieldKind::BigInteger, Value::Integer(v)) => Some(Value::String(v.to_string())),
        _ => Some(value.clone()),
    }
}

/// The SQL token written into the VALUES row for a field.
pub fn sql_fragment(kind: FieldKind, value: &Value, key: &str) -> Cow<'static, str> {
    if is_now_sentinel(kind, value) {
        return Cow::Borrowed(NOW_SQL);
    }
    match kind {
        FieldKind::BigInteger => Cow::Owned(format!("CAST(:{key} AS BIGINT)")),
        FieldKind::Integer
        | FieldKind::Float
        | FieldKind::String
        | FieldKind::Boolean
        | FieldKind::Date => Cow::Owned(format!(":{key}")),
    }
}
