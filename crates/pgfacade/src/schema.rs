//! Field definitions: the schema a record is checked and serialized against.
//!
//! ```ignore
//! use pgfacade::{FieldDef, FieldObjectDefinition};
//!
//! let accounts = FieldObjectDefinition::build([
//!     ("id", FieldDef::big_integer().not_null()),
//!     ("ownerName", FieldDef::string()),
//!     ("createdAt", FieldDef::date().default_now()),
//! ])?;
//! # Ok::<(), pgfacade::FacadeError>(())
//! ```

use crate::error::{FacadeError, FacadeResult};
use crate::ident::column_name;
use crate::value::Value;
use indexmap::IndexMap;

/// The kind of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Integer,
    Float,
    BigInteger,
    String,
    Boolean,
    Date,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::BigInteger => "big integer",
            FieldKind::String => "string",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
        }
    }
}

/// Value used when a field is absent or null in raw input.
#[derive(Debug, Clone)]
pub enum FieldDefault {
    /// A fixed value.
    Value(Value),
    /// A value computed on every use.
    Computed(fn() -> Value),
    /// The "treat-as-now" sentinel.
    Now,
}

impl FieldDefault {
    pub fn resolve(&self) -> Value {
        match self {
            FieldDefault::Value(v) => v.clone(),
            FieldDefault::Computed(f) => f(),
            FieldDefault::Now => Value::Now,
        }
    }
}

/// A single field: kind, nullability and optional default.
///
/// Fields are nullable unless [`FieldDef::not_null`] is applied.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub kind: FieldKind,
    pub nullable: bool,
    pub default: Option<FieldDefault>,
}

impl FieldDef {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            nullable: true,
            default: None,
        }
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Integer)
    }

    pub fn float() -> Self {
        Self::new(FieldKind::Float)
    }

    pub fn big_integer() -> Self {
        Self::new(FieldKind::BigInteger)
    }

    pub fn string() -> Self {
        Self::new(FieldKind::String)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn date() -> Self {
        Self::new(FieldKind::Date)
    }

    /// Require a non-null value.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    pub fn default_with(mut self, f: fn() -> Value) -> Self {
        self.default = Some(FieldDefault::Computed(f));
        self
    }

    /// Default to the database clock. Only meaningful for date fields.
    pub fn default_now(mut self) -> Self {
        self.default = Some(FieldDefault::Now);
        self
    }
}

/// Ordered mapping from field name (camelCase) to [`FieldDef`].
///
/// Order is insertion order and drives the column order of generated SELECTs.
#[derive(Debug, Clone, Default)]
pub struct FieldObjectDefinition {
    fields: IndexMap<String, FieldDef>,
}

impl FieldObjectDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a definition from `(name, field)` pairs, rejecting duplicate names.
    pub fn build<I, K>(fields: I) -> FacadeResult<Self>
    where
        I: IntoIterator<Item = (K, FieldDef)>,
        K: Into<String>,
    {
        let mut def = Self::new();
        for (name, field) in fields {
            def.push(name, field)?;
        }
        Ok(def)
    }

    /// Append a field.
    pub fn push(&mut self, name: impl Into<String>, field: FieldDef) -> FacadeResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(FacadeError::validation("Field name cannot be empty"));
        }
        if self.fields.contains_key(&name) {
            return Err(FacadeError::validation(format!(
                "Duplicate field '{name}' in definition"
            )));
        }
        self.fields.insert(name, field);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.fields.get(name).map(|f| f.kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDef)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Column identifiers for every field, in definition order.
    pub fn column_names(&self) -> impl Iterator<Item = String> + '_ {
        self.names().map(column_name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
