#![allow(dead_code)]

use pgfacade::{FacadeError, FacadeResult, Params, QueryExecutor, QueryOutput, RawRow};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum Reply {
    Rows(Vec<RawRow>),
    Fail(String),
}

/// Records every call and answers with a canned reply.
pub struct RecordingExecutor {
    calls: Mutex<Vec<(String, Option<Params>)>>,
    reply: Mutex<Reply>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reply: Mutex::new(Reply::Rows(Vec::new())),
        }
    }

    pub fn returning(rows: serde_json::Value) -> Self {
        let exec = Self::new();
        exec.reply_with(rows);
        exec
    }

    pub fn failing(message: &str) -> Self {
        let exec = Self::new();
        *exec.reply.lock().unwrap() = Reply::Fail(message.to_string());
        exec
    }

    pub fn reply_with(&self, rows: serde_json::Value) {
        let rows = match rows {
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::Object(map) => map,
                    other => panic!("row must be an object, got {other}"),
                })
                .collect(),
            other => panic!("rows must be an array, got {other}"),
        };
        *self.reply.lock().unwrap() = Reply::Rows(rows);
    }

    pub fn calls(&self) -> Vec<(String, Option<Params>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn only_call(&self) -> (String, Option<Params>) {
        let calls = self.calls();
        assert_eq!(calls.len(), 1, "expected exactly one executor call, got {calls:?}");
        calls.into_iter().next().unwrap()
    }
}

impl QueryExecutor for RecordingExecutor {
    async fn query(&self, sql: &str, params: Option<&Params>) -> FacadeResult<QueryOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.cloned()));
        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Rows(records) => Ok(QueryOutput { records }),
            Reply::Fail(message) => Err(FacadeError::executor(message)),
        }
    }
}

pub fn params(entries: &[(&str, pgfacade::Value)]) -> Params {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
