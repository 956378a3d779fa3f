//! `tokio-postgres` backed [`QueryExecutor`].
//!
//! The facade speaks `:name` placeholders; PostgreSQL wants `$n`. Statements are
//! rewritten before execution, and [`Value`] adapts itself to whatever parameter
//! type the server inferred, so a big integer bound as text under
//! `CAST(:x AS BIGINT)` still lands as an `int8`.
//!
//! ```ignore
//! use pgfacade::{ConnectionTimeouts, TypedFacade, postgres};
//!
//! let executor = postgres::connect(&database_url, &ConnectionTimeouts::default()).await?;
//! let db = TypedFacade::new(executor);
//! ```

use crate::config::ConnectionTimeouts;
use crate::error::{FacadeError, FacadeResult};
use crate::executor::{QueryExecutor, QueryOutput};
use crate::value::{Params, RawRow, Value};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;
use tokio_postgres::types::{IsNull, ToSql, Type, WrongType, to_sql_checked};
use tokio_postgres::{Client, NoTls, Row};

type BoxError = Box<dyn Error + Sync + Send>;

/// Rewrite `:name` placeholders into positional `$n` ones.
///
/// Returns the rewritten SQL and the values in positional order. A name used
/// twice reuses its slot. `::` casts, string literals, quoted identifiers and
/// comments are copied through untouched, as are `E'...'`
/// escape strings and `$tag$...$tag$` dollar-quoted bodies.
pub fn rewrite_named<'p>(
    sql: &str,
    params: Option<&'p Params>,
) -> FacadeResult<(String, Vec<&'p Value>)> {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut values: Vec<&'p Value> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut i = 0;
    let mut copied = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == quote {
                        if bytes.get(i + 1) == Some(&quote) {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'E' | b'e' if bytes.get(i + 1) == Some(&b'\'') && !follows_ident(bytes, i) => {
                i += 2;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' => i += 2,
                        b'\'' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
                        b'\'' => break,
                        _ => i += 1,
                    }
                }
                i += 1;
            }
            b'$' if !follows_ident(bytes, i) => {
                i = match dollar_tag(bytes, i) {
                    Some(tag) => {
                        let body = i + tag.len();
                        sql[body..]
                            .find(tag)
                            .map_or(bytes.len(), |end| body + end + tag.len())
                    }
                    None => i + 1,
                };
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 2;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                i += 2;
            }
            b':' if bytes
                .get(i + 1)
                .is_some_and(|c| c.is_ascii_alphabetic() || *c == b'_') =>
            {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                let name = &sql[start..end];
                let slot = match slots.get(name) {
                    Some(slot) => *slot,
                    None => {
                        let value = params.and_then(|p| p.get(name)).ok_or_else(|| {
                            FacadeError::validation(format!(
                                "No value supplied for parameter ':{name}'"
                            ))
                        })?;
                        values.push(value);
                        slots.insert(name, values.len());
                        values.len()
                    }
                };
                out.push_str(&sql[copied..i]);
                out.push('$');
                out.push_str(&slot.to_string());
                copied = end;
                i = end;
            }
            _ => i += 1,
        }
    }
    out.push_str(&sql[copied.min(sql.len())..]);
    Ok((out, values))
}

fn follows_ident(bytes: &[u8], i: usize) -> bool {
    i > 0 && (bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_' || bytes[i - 1] == b'$')
}

/// The `$tag$` opening a dollar-quoted literal at `start`, if any. `$1` is not one.
fn dollar_tag(bytes: &[u8], start: usize) -> Option<&str> {
    let mut end = start + 1;
    if bytes.get(end).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    if bytes.get(end) != Some(&b'$') {
        return None;
    }
    std::str::from_utf8(&bytes[start..=end]).ok()
}

fn wrong_type(ty: &Type) -> BoxError {
    Box::new(WrongType::new::<Value>(ty.clone()))
}

fn integer_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::INT2 {
        i16::try_from(v)?.to_sql(ty, out)
    } else if *ty == Type::INT4 {
        i32::try_from(v)?.to_sql(ty, out)
    } else if *ty == Type::INT8 {
        v.to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        (v as f32).to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        (v as f64).to_sql(ty, out)
    } else if is_text(ty) {
        v.to_string().to_sql(ty, out)
    } else {
        Err(wrong_type(ty))
    }
}

fn is_integer(ty: &Type) -> bool {
    *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8
}

fn is_float(ty: &Type) -> bool {
    *ty == Type::FLOAT4 || *ty == Type::FLOAT8
}

fn is_text(ty: &Type) -> bool {
    *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
}

fn is_temporal(ty: &Type) -> bool {
    *ty == Type::TIMESTAMPTZ || *ty == Type::TIMESTAMP || *ty == Type::DATE
}

/// Binds against the parameter type the server inferred.
///
/// A value binds to its own type family or to text. Any other pairing is a
/// `WrongType` error rather than another type's encoding on the wire.
impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Integer(v) => integer_to_sql(*v, ty, out),
            Value::Float(v) => {
                if *ty == Type::FLOAT4 {
                    (*v as f32).to_sql(ty, out)
                } else if *ty == Type::FLOAT8 {
                    v.to_sql(ty, out)
                } else if is_text(ty) {
                    v.to_string().to_sql(ty, out)
                } else {
                    Err(wrong_type(ty))
                }
            }
            Value::BigInteger(v) => {
                if is_integer(ty) {
                    integer_to_sql(i64::try_from(v)?, ty, out)
                } else if is_text(ty) {
                    v.to_string().to_sql(ty, out)
                } else {
                    Err(wrong_type(ty))
                }
            }
            Value::String(s) => {
                if is_integer(ty) {
                    integer_to_sql(s.trim().parse::<i64>()?, ty, out)
                } else if is_float(ty) {
                    Value::Float(s.trim().parse::<f64>()?).to_sql(ty, out)
                } else if is_text(ty) {
                    s.as_str().to_sql(ty, out)
                } else {
                    Err(wrong_type(ty))
                }
            }
            Value::Boolean(b) => {
                if *ty == Type::BOOL {
                    b.to_sql(ty, out)
                } else if is_text(ty) {
                    b.to_string().to_sql(ty, out)
                } else {
                    Err(wrong_type(ty))
                }
            }
            Value::Date(d) => {
                if *ty == Type::TIMESTAMPTZ {
                    d.to_sql(ty, out)
                } else if *ty == Type::TIMESTAMP {
                    d.naive_utc().to_sql(ty, out)
                } else if *ty == Type::DATE {
                    d.date_naive().to_sql(ty, out)
                } else if is_text(ty) {
                    d.to_rfc3339_opts(SecondsFormat::Millis, true).to_sql(ty, out)
                } else {
                    Err(wrong_type(ty))
                }
            }
            Value::Now => Err("the `now` sentinel is rendered as now() and cannot be bound".into()),
        }
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::BOOL || is_integer(ty) || is_float(ty) || is_text(ty) || is_temporal(ty)
    }

    to_sql_checked!();
}

fn column_to_json(row: &Row, idx: usize, ty: &Type) -> Result<Json, tokio_postgres::Error> {
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(Json::from)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(Json::from)
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(Json::from)
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(Json::from)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?.map(Json::from)
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(Json::from)
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|d| Json::from(d.to_rfc3339_opts(SecondsFormat::Millis, true)))
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|d| Json::from(d.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true)))
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx)?
            .map(|d| Json::from(d.to_string()))
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        row.try_get::<_, Option<Json>>(idx)?
    } else {
        row.try_get::<_, Option<String>>(idx)?.map(Json::from)
    };
    Ok(value.unwrap_or(Json::Null))
}

/// Convert a result row into a raw row, keeping column names verbatim.
pub fn row_to_raw(row: &Row) -> FacadeResult<RawRow> {
    let mut raw = RawRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_to_json(row, idx, column.type_())
            .map_err(|e| FacadeError::decode(column.name(), e.to_string()))?;
        raw.insert(column.name().to_string(), value);
    }
    Ok(raw)
}

async fn run(client: &Client, sql: &str, params: Option<&Params>) -> FacadeResult<QueryOutput> {
    let (sql, values) = rewrite_named(sql, params)?;
    let refs: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| *v as &(dyn ToSql + Sync)).collect();
    let rows = Client::query(client, sql.as_str(), &refs)
        .await
        .map_err(FacadeError::from_db_error)?;
    let records = rows.iter().map(row_to_raw).collect::<FacadeResult<Vec<_>>>()?;
    Ok(QueryOutput { records })
}

impl QueryExecutor for Client {
    async fn query(&self, sql: &str, params: Option<&Params>) -> FacadeResult<QueryOutput> {
        run(self, sql, params).await
    }
}

/// A client bound to a per-request timeout.
pub struct PgExecutor {
    client: Client,
    request_timeout: Duration,
}

impl PgExecutor {
    pub fn new(client: Client, timeouts: &ConnectionTimeouts) -> Self {
        Self {
            client,
            request_timeout: timeouts.request_timeout,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

impl QueryExecutor for PgExecutor {
    async fn query(&self, sql: &str, params: Option<&Params>) -> FacadeResult<QueryOutput> {
        match tokio::time::timeout(self.request_timeout, run(&self.client, sql, params)).await {
            Ok(result) => result,
            Err(_) => Err(FacadeError::Timeout(self.request_timeout)),
        }
    }
}

/// Connect without TLS, honouring the connect timeout and retry budget.
///
/// The connection task is spawned onto the current Tokio runtime.
pub async fn connect(database_url: &str, timeouts: &ConnectionTimeouts) -> FacadeResult<PgExecutor> {
    let mut config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| FacadeError::Connection(e.to_string()))?;
    config.connect_timeout(timeouts.connect_timeout);

    let mut attempt = 0;
    loop {
        match config.connect(NoTls).await {
            Ok((client, connection)) => {
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::error!(target: "pgfacade.connection", error = %e, "connection closed with error");
                    }
                });
                return Ok(PgExecutor::new(client, timeouts));
            }
            Err(e) if attempt < timeouts.max_retries => {
                attempt += 1;
                tracing::warn!(
                    target: "pgfacade.connection",
                    attempt,
                    max_retries = timeouts.max_retries,
                    error = %e,
                    "connect failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(100 << attempt.min(5))).await;
            }
            Err(e) => return Err(FacadeError::Connection(e.to_string())),
        }
    }
}
