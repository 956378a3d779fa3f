//! Typed field values, records and parameter maps.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use num_bigint::BigInt;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Named bind parameters, keyed without the leading `:`.
pub type Params = IndexMap<String, Value>;

/// A row as returned by an executor: column name to raw JSON scalar.
pub type RawRow = serde_json::Map<String, serde_json::Value>;

/// Text that the `Now` sentinel is written as and parsed from.
pub const NOW_LITERAL: &str = "now";

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    /// Arbitrary-precision integer.
    BigInteger(BigInt),
    String(String),
    Boolean(bool),
    Date(DateTime<Utc>),
    /// "Use the database clock" marker. Only meaningful in a Date field.
    Now,
}

impl Value {
    /// Check if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::BigInteger(_) => "big integer",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Date(_) | Value::Now => "date",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_big_int(&self) -> Option<&BigInt> {
        match self {
            Value::BigInteger(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to JSON. Big integers become decimal strings so no precision is lost.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(v) => (*v).into(),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::BigInteger(v) => v.to_string().into(),
            Value::String(v) => v.clone().into(),
            Value::Boolean(v) => (*v).into(),
            Value::Date(v) => v.to_rfc3339_opts(SecondsFormat::Millis, true).into(),
            Value::Now => NOW_LITERAL.into(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::BigInteger(v) => serializer.collect_str(v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Boolean(v) => serializer.serialize_bool(*v),
            Value::Date(v) => {
                serializer.serialize_str(&v.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Value::Now => serializer.serialize_str(NOW_LITERAL),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::BigInteger(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A record conforming to a [`FieldObjectDefinition`](crate::FieldObjectDefinition).
///
/// Keys keep insertion order. An absent key is not the same as a key holding
/// [`Value::Null`]: absent fields are skipped entirely when inserting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbRecord {
    fields: IndexMap<String, Value>,
}

impl DbRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert to a JSON object using the big-integer-safe representation.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl Serialize for DbRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for DbRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DbRecord {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Render any serializable payload as JSON, with big integers as decimal strings.
///
/// This is the only serializer used for diagnostics and handler responses, so
/// arbitrary-precision values never pass through a lossy float conversion.
pub fn stringify_with_bigints<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn big_integers_serialize_as_strings() {
        let big: BigInt = "123456789012345678901234567890".parse().unwrap();
        let mut params = Params::new();
        params.insert("big_0".into(), Value::BigInteger(big));
        params.insert("n_0".into(), Value::Null);
        assert_eq!(
            stringify_with_bigints(&params),
            r#"{"big_0":"123456789012345678901234567890","n_0":null}"#
        );
    }

    #[test]
    fn dates_serialize_as_rfc3339() {
        let d = Utc.with_ymd_and_hms(1974, 3, 2, 0, 0, 0).unwrap();
        assert_eq!(
            Value::Date(d).to_json(),
            serde_json::json!("1974-03-02T00:00:00.000Z")
        );
        assert_eq!(Value::Now.to_json(), serde_json::json!("now"));
    }

    #[test]
    fn record_keeps_insertion_order() {
        let rec = DbRecord::new().with("b", 1).with("a", "x");
        assert_eq!(rec.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(rec.to_json(), serde_json::json!({"b": 1, "a": "x"}));
    }

    #[test]
    fn option_maps_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(3_i64)), Value::Integer(3));
    }
}
