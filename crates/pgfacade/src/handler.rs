//! Routing of inbound events to typed implementations.
//!
//! An event names an api and a function and carries a JSON body. The body is
//! unmarshalled against the function's argument definition and handed, together
//! with a [`TypedFacade`], to the registered implementation.
//!
//! ```ignore
//! let apis = ApiList::new().function("accounts", "open", ApiFunction::with_arg(account_input));
//! let handler = IntegrationHandler::new(apis).implement("accounts", "open", |props, arg| async move {
//!     let arg = arg.and_then(Argument::into_record).unwrap_or_default();
//!     let saved = props.db.multi_insert(&account_row, "accounts", vec![arg]).await?;
//!     Ok(serde_json::to_value(&saved)?)
//! })?;
//! ```

use crate::error::{FacadeError, FacadeResult};
use crate::executor::QueryExecutor;
use crate::facade::TypedFacade;
use crate::schema::FieldObjectDefinition;
use crate::unmarshal::{unmarshal_many, unmarshal_value};
use crate::value::DbRecord;
use futures_core::future::BoxFuture;
use futures_util::FutureExt;
use indexmap::IndexMap;
use std::future::Future;
use std::sync::Arc;

/// Returned instead of running the implementation when probing connectivity.
pub const CONNECTED: &str = "@connected";

/// Inbound event payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportedEvent {
    pub body: String,
}

impl ReportedEvent {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

/// Shape of a function argument.
#[derive(Debug, Clone)]
pub enum ArgShape {
    /// A single JSON object.
    Record(FieldObjectDefinition),
    /// A JSON array of objects.
    List(FieldObjectDefinition),
}

/// A dispatched argument, unmarshalled according to its [`ArgShape`].
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Record(DbRecord),
    List(Vec<DbRecord>),
}

impl Argument {
    pub fn into_record(self) -> Option<DbRecord> {
        match self {
            Argument::Record(record) => Some(record),
            Argument::List(_) => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<DbRecord>> {
        match self {
            Argument::List(records) => Some(records),
            Argument::Record(_) => None,
        }
    }
}

/// Signature of a function: its argument shape, or `None` for no argument.
#[derive(Debug, Clone, Default)]
pub struct ApiFunction {
    pub arg: Option<ArgShape>,
}

impl ApiFunction {
    pub fn void() -> Self {
        Self { arg: None }
    }

    pub fn with_arg(arg: FieldObjectDefinition) -> Self {
        Self {
            arg: Some(ArgShape::Record(arg)),
        }
    }

    pub fn with_list_arg(arg: FieldObjectDefinition) -> Self {
        Self {
            arg: Some(ArgShape::List(arg)),
        }
    }

    /// Parse and unmarshal an event body against this signature.
    pub fn argument(&self, body: &str) -> FacadeResult<Option<Argument>> {
        let Some(shape) = &self.arg else {
            return Ok(None);
        };
        let body: serde_json::Value = serde_json::from_str(body)?;
        let argument = match shape {
            ArgShape::Record(definition) => Argument::Record(unmarshal_value(definition, &body)?),
            ArgShape::List(definition) => Argument::List(unmarshal_many(definition, &body)?),
        };
        Ok(Some(argument))
    }
}

/// Api name to function name to signature.
#[derive(Debug, Clone, Default)]
pub struct ApiList {
    apis: IndexMap<String, IndexMap<String, ApiFunction>>,
}

impl ApiList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function(
        mut self,
        api: impl Into<String>,
        function: impl Into<String>,
        signature: ApiFunction,
    ) -> Self {
        self.apis
            .entry(api.into())
            .or_default()
            .insert(function.into(), signature);
        self
    }

    pub fn get(&self, api: &str, function: &str) -> Option<&ApiFunction> {
        self.apis.get(api).and_then(|functions| functions.get(function))
    }
}

/// What the dispatcher is given: the raw executor.
pub struct InputProps<E> {
    pub db: Arc<E>,
}

/// What an implementation is given: the typed facade over that executor.
pub struct ImplementationProps<E> {
    pub db: TypedFacade<Arc<E>>,
}

type Implementation<E> = Box<
    dyn Fn(ImplementationProps<E>, Option<Argument>) -> BoxFuture<'static, FacadeResult<serde_json::Value>>
        + Send
        + Sync,
>;

/// Dispatches `(api, function)` pairs to registered implementations.
pub struct IntegrationHandler<E> {
    apis: ApiList,
    implementations: IndexMap<(String, String), Implementation<E>>,
}

impl<E: QueryExecutor + 'static> IntegrationHandler<E> {
    pub fn new(apis: ApiList) -> Self {
        Self {
            apis,
            implementations: IndexMap::new(),
        }
    }

    /// Register the implementation of a declared function.
    pub fn implement<F, Fut>(
        mut self,
        api: impl Into<String>,
        function: impl Into<String>,
        f: F,
    ) -> FacadeResult<Self>
    where
        F: Fn(ImplementationProps<E>, Option<Argument>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FacadeResult<serde_json::Value>> + Send + 'static,
    {
        let api = api.into();
        let function = function.into();
        if self.apis.get(&api, &function).is_none() {
            return Err(FacadeError::validation(format!(
                "Cannot implement undeclared function {api}.{function}"
            )));
        }
        let implementation: Implementation<E> =
            Box::new(move |props: ImplementationProps<E>, arg: Option<Argument>| {
                f(props, arg).boxed()
            });
        self.implementations.insert((api, function), implementation);
        Ok(self)
    }

    /// Handle one event.
    ///
    /// Order matters: an unknown function fails even when only probing, and a probe
    /// never parses the body or touches the database.
    pub async fn handle(
        &self,
        props: InputProps<E>,
        api: &str,
        function: &str,
        event: &ReportedEvent,
        test_connection: bool,
    ) -> FacadeResult<serde_json::Value> {
        let caller = self
            .implementations
            .get(&(api.to_string(), function.to_string()))
            .ok_or_else(|| FacadeError::NotImplemented {
                api: api.to_string(),
                function: function.to_string(),
            })?;
        if test_connection {
            return Ok(serde_json::Value::String(CONNECTED.to_string()));
        }

        let argument = match self.apis.get(api, function) {
            Some(signature) => signature.argument(&event.body)?,
            None => None,
        };

        tracing::debug!(target: "pgfacade.handler", api, function, "dispatching");
        caller(
            ImplementationProps {
                db: TypedFacade::new(props.db),
            },
            argument,
        )
        .await
    }
}
