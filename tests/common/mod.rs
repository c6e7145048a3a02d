#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use parking_lot::Mutex;
use scopeline::pipeline::{Request, Response};
use scopeline::{DiResult, Field, Logger, ResolutionContext};
use std::sync::Arc;
use tracing::Level;

/// One captured log record.
#[derive(Debug, Clone)]
pub struct Record {
    pub level: Level,
    pub message: String,
    pub fields: Vec<Field>,
}

impl Record {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
    }
}

/// Logger that keeps every record in memory, shared by all its derived loggers.
#[derive(Clone, Default)]
pub struct MemoryLogger {
    records: Arc<Mutex<Vec<Record>>>,
    fields: Vec<Field>,
    group: Option<String>,
}

impl MemoryLogger {
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.message).collect()
    }

    /// Builder that hands out loggers sharing this one's buffer.
    pub fn builder(&self) -> impl Fn(&ResolutionContext) -> DiResult<MemoryLogger> + Send + Sync + 'static {
        let shared = self.clone();
        move |_: &ResolutionContext| Ok(shared.clone())
    }

    fn qualify(&self, f: &Field) -> Field {
        match &self.group {
            Some(g) => scopeline::field(format!("{}.{}", g, f.key), &f.value),
            None => f.clone(),
        }
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: Level, message: &str, fields: &[Field]) {
        let mut all = self.fields.clone();
        all.extend(fields.iter().map(|f| self.qualify(f)));
        self.records.lock().push(Record {
            level,
            message: message.to_string(),
            fields: all,
        });
    }

    fn with(&self, fields: Vec<Field>) -> Arc<dyn Logger> {
        let mut next = self.clone();
        next.fields.extend(fields.iter().map(|f| self.qualify(f)));
        Arc::new(next)
    }

    fn with_group(&self, name: &str) -> Arc<dyn Logger> {
        let mut next = self.clone();
        next.group = Some(match &self.group {
            Some(g) => format!("{}.{}", g, name),
            None => name.to_string(),
        });
        Arc::new(next)
    }
}

pub fn get(uri: &str) -> Request {
    axum::http::Request::builder()
        .uri(uri)
        .header("user-agent", "scopeline-tests")
        .body(Body::empty())
        .unwrap()
}

pub async fn text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
