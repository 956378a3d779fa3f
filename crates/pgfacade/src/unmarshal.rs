//! Raw row to typed record conversion.
//!
//! Executors hand back loosely-typed JSON scalars: digits as strings, booleans as
//! `0`/`1`, dates as text. Each field of the definition is looked up in the raw row
//! and coerced into its [`FieldKind`].

use crate::error::{FacadeError, FacadeResult};
use crate::ident::column_name;
use crate::schema::{FieldDef, FieldKind, FieldObjectDefinition};
use crate::value::{DbRecord, NOW_LITERAL, RawRow, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use num_bigint::BigInt;
use serde_json::Value as Json;

/// Convert one raw row into a record holding every field of `definition`.
///
/// Lookup order for a field is: its own name, its snake_case column, then its
/// lowercased name. Raw keys matching no field are ignored. Absent and `null`
/// values fall back to the field default, then to `Null` for nullable fields;
/// anything else is a validation error.
pub fn unmarshal(definition: &FieldObjectDefinition, row: &RawRow) -> FacadeResult<DbRecord> {
    let mut record = DbRecord::new();
    for (name, field) in definition.iter() {
        let raw = lookup(row, name);
        let value = match raw {
            Some(raw) if !raw.is_null() => coerce(name, field.kind, raw)?,
            _ => missing(name, field)?,
        };
        record.insert(name, value);
    }
    Ok(record)
}

/// Convert a JSON array of objects. Any other shape is a decode error.
pub fn unmarshal_many(definition: &FieldObjectDefinition, raw: &Json) -> FacadeResult<Vec<DbRecord>> {
    let Json::Array(items) = raw else {
        return Err(FacadeError::decode("<root>", "expected an array of objects"));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Json::Object(row) => unmarshal(definition, row),
            other => Err(FacadeError::decode(
                format!("[{i}]"),
                format!("expected an object, got {other}"),
            )),
        })
        .collect()
}

/// Convert a single JSON value, which must be an object.
pub fn unmarshal_value(definition: &FieldObjectDefinition, raw: &Json) -> FacadeResult<DbRecord> {
    match raw {
        Json::Object(row) => unmarshal(definition, row),
        other => Err(FacadeError::decode(
            "<root>",
            format!("expected an object, got {other}"),
        )),
    }
}

fn lookup<'a>(row: &'a RawRow, name: &str) -> Option<&'a Json> {
    row.get(name)
        .or_else(|| row.get(&column_name(name)))
        .or_else(|| row.get(&name.to_lowercase()))
}

fn missing(name: &str, field: &FieldDef) -> FacadeResult<Value> {
    let value = field
        .default
        .as_ref()
        .map(|d| d.resolve())
        .unwrap_or(Value::Null);
    if value.is_null() && !field.nullable {
        return Err(FacadeError::validation(format!(
            "Field '{name}' is required but no value was provided"
        )));
    }
    Ok(value)
}

fn coerce(name: &str, kind: FieldKind, raw: &Json) -> FacadeResult<Value> {
    let fail = || {
        FacadeError::decode(
            name,
            format!("cannot convert {raw} into a {} value", kind.name()),
        )
    };
    match kind {
        FieldKind::Integer => match raw {
            Json::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| is_integral_i64(*f)).map(|f| f as i64))
                .map(Value::Integer)
                .ok_or_else(fail),
            Json::String(s) => s.trim().parse().map(Value::Integer).map_err(|_| fail()),
            _ => Err(fail()),
        },
        FieldKind::Float => match raw {
            Json::Number(n) => n.as_f64().map(Value::Float).ok_or_else(fail),
            Json::String(s) => s.trim().parse().map(Value::Float).map_err(|_| fail()),
            _ => Err(fail()),
        },
        FieldKind::BigInteger => match raw {
            Json::Number(n) if n.is_i64() || n.is_u64() => n
                .to_string()
                .parse::<BigInt>()
                .map(Value::BigInteger)
                .map_err(|_| fail()),
            Json::String(s) => s
                .trim()
                .parse::<BigInt>()
                .map(Value::BigInteger)
                .map_err(|_| fail()),
            _ => Err(fail()),
        },
        FieldKind::String => match raw {
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Number(n) => Ok(Value::String(n.to_string())),
            Json::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(fail()),
        },
        FieldKind::Boolean => match raw {
            Json::Bool(b) => Ok(Value::Boolean(*b)),
            Json::Number(n) => match n.as_i64() {
                Some(0) => Ok(Value::Boolean(false)),
                Some(1) => Ok(Value::Boolean(true)),
                _ => Err(fail()),
            },
            Json::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Boolean(true)),
                "false" | "f" | "0" => Ok(Value::Boolean(false)),
                _ => Err(fail()),
            },
            _ => Err(fail()),
        },
        FieldKind::Date => match raw {
            Json::String(s) => parse_date(s.trim()).ok_or_else(fail),
            Json::Number(n) => n
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .map(Value::Date)
                .ok_or_else(fail),
            _ => Err(fail()),
        },
    }
}

/// Integral and inside `i64`; `i64::MAX as f64` rounds up to 2^63, hence the strict bound.
fn is_integral_i64(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

fn parse_date(s: &str) -> Option<Value> {
    if s.eq_ignore_ascii_case(NOW_LITERAL) {
        return Some(Value::Now);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(Value::Date(dt.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Value::Date(naive.and_utc()));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Value::Date(naive.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Json) -> RawRow {
        match value {
            Json::Object(map) => map,
            _ => unreachable!("test rows are objects"),
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> Value {
        Value::Date(Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap())
    }

    #[test]
    fn converts_raw_scalars_by_kind() {
        let definition = FieldObjectDefinition::build([
            ("creationOrder", FieldDef::integer().default_value(5)),
            ("intNotNull", FieldDef::integer().not_null()),
            ("somethingFloat", FieldDef::float()),
            ("somethingBig", FieldDef::big_integer().not_null()),
            ("ecriture", FieldDef::string()),
            ("unJour", FieldDef::date()),
            ("veritas", FieldDef::boolean()),
        ])
        .unwrap();
        let record = unmarshal(
            &definition,
            &row(json!({
                "intNotNull": "0",
                "creationorder": "1",
                "somethingfloat": "3.456",
                "something_big": "12345678901234567890",
                "ecriture": "451",
                "un_jour": "1990-03-11",
                "veritas": true,
            })),
        )
        .unwrap();

        assert_eq!(record.get("creationOrder"), Some(&Value::Integer(1)));
        assert_eq!(record.get("intNotNull"), Some(&Value::Integer(0)));
        assert_eq!(record.get("somethingFloat"), Some(&Value::Float(3.456)));
        assert_eq!(
            record.get("somethingBig"),
            Some(&Value::BigInteger("12345678901234567890".parse().unwrap()))
        );
        assert_eq!(record.get("ecriture"), Some(&Value::String("451".into())));
        assert_eq!(record.get("unJour"), Some(&ymd(1990, 3, 11)));
        assert_eq!(record.get("veritas"), Some(&Value::Boolean(true)));
    }

    #[test]
    fn applies_defaults_and_nulls() {
        let definition = FieldObjectDefinition::build([
            ("withDefault", FieldDef::integer().default_value(5)),
            ("calculated", FieldDef::integer().default_with(|| Value::Integer(2 * 2))),
            ("nullableInt", FieldDef::integer()),
            ("stamp", FieldDef::date().default_now()),
        ])
        .unwrap();
        let record = unmarshal(&definition, &RawRow::new()).unwrap();
        assert_eq!(record.get("withDefault"), Some(&Value::Integer(5)));
        assert_eq!(record.get("calculated"), Some(&Value::Integer(4)));
        assert_eq!(record.get("nullableInt"), Some(&Value::Null));
        assert_eq!(record.get("stamp"), Some(&Value::Now));
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["withDefault", "calculated", "nullableInt", "stamp"]);
    }

    #[test]
    fn required_field_must_be_present() {
        let definition =
            FieldObjectDefinition::build([("accountId", FieldDef::big_integer().not_null())]).unwrap();
        let err = unmarshal(&definition, &row(json!({"accountId": null}))).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn nullable_big_integer_stays_null() {
        let definition = FieldObjectDefinition::build([("accountId", FieldDef::big_integer())]).unwrap();
        let record = unmarshal(&definition, &row(json!({"accountId": null}))).unwrap();
        assert_eq!(record.get("accountId"), Some(&Value::Null));
    }

    #[test]
    fn big_integer_string_round_trips() {
        let v: BigInt = "98765432109876543210987654321".parse().unwrap();
        let definition = FieldObjectDefinition::build([("big", FieldDef::big_integer())]).unwrap();
        let record = unmarshal(&definition, &row(json!({"big": v.to_string()}))).unwrap();
        assert_eq!(record.get("big"), Some(&Value::BigInteger(v)));
    }

    #[test]
    fn accepts_truthy_raw_booleans() {
        let definition = FieldObjectDefinition::build([("flag", FieldDef::boolean())]).unwrap();
        for (raw, expected) in [
            (json!(1), true),
            (json!(0), false),
            (json!("t"), true),
            (json!("false"), false),
        ] {
            let record = unmarshal(&definition, &row(json!({"flag": raw}))).unwrap();
            assert_eq!(record.get("flag"), Some(&Value::Boolean(expected)));
        }
    }

    #[test]
    fn parses_date_forms() {
        assert_eq!(parse_date("now"), Some(Value::Now));
        assert_eq!(parse_date("1974-03-02"), Some(ymd(1974, 3, 2)));
        assert_eq!(parse_date("1974-03-02T00:00:00Z"), Some(ymd(1974, 3, 2)));
        assert_eq!(parse_date("1974-03-02 00:00:00"), Some(ymd(1974, 3, 2)));
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn rejects_mismatched_kinds() {
        let definition = FieldObjectDefinition::build([("count", FieldDef::integer())]).unwrap();
        let err = unmarshal(&definition, &row(json!({"count": "many"}))).unwrap_err();
        assert!(matches!(err, FacadeError::Decode { ref column, .. } if column == "count"));
    }

    #[test]
    fn out_of_range_integers_are_decode_errors() {
        let definition = FieldObjectDefinition::build([("n", FieldDef::integer())]).unwrap();
        for raw in [json!({"n": 1e30}), json!({"n": -1e30}), json!({"n": 9.3e18})] {
            let err = unmarshal(&definition, &row(raw)).unwrap_err();
            assert!(matches!(err, FacadeError::Decode { ref column, .. } if column == "n"));
        }
        let record = unmarshal(&definition, &row(json!({"n": 42.0}))).unwrap();
        assert_eq!(record.get("n"), Some(&Value::Integer(42)));
        assert!(unmarshal(&definition, &row(json!({"n": 1.5}))).is_err());
    }

    #[test]
    fn unmarshals_arrays() {
        let definition = FieldObjectDefinition::build([("id", FieldDef::integer())]).unwrap();
        let records = unmarshal_many(&definition, &json!([{"id": "1"}, {"id": 2}])).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("id"), Some(&Value::Integer(1)));
        assert!(unmarshal_many(&definition, &json!({"id": 1})).is_err());
    }
}
