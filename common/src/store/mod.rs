//! Interfaces between the reconciler and the record store.

use crate::SyncResult;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[cfg(test)]
pub(crate) mod memory;
mod pocket;

pub use pocket::PocketStore;

/// A persisted record: the store-assigned id plus every other field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StoredRecord {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// An equality filter over one or more fields, joined with `&&`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    #[must_use]
    pub fn eq(field: &str, value: Value) -> Self {
        Filter::default().and(field, value)
    }

    #[must_use]
    pub fn and(mut self, field: &str, value: Value) -> Self {
        self.clauses.push((field.to_string(), value));
        self
    }

    #[must_use]
    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    /// Render as a PocketBase filter expression, e.g. `name="X" && areaNumber=3`.
    #[must_use]
    pub fn render(&self) -> String {
        self.clauses
            .iter()
            .map(|(field, value)| format!("{field}={}", render_literal(value)))
            .join(" && ")
    }
}

fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        other => quote(&other.to_string()),
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// The operations the sync engine needs from a record store.
///
/// Lookups return `Ok(None)` when nothing matches; only transport or
/// unexpected status failures are errors.
pub trait RecordStore {
    /// Find the first record in `collection` matching `filter`.
    fn find_first(&self, collection: &str, filter: &Filter) -> SyncResult<Option<StoredRecord>>;

    /// Return whatever record sits on page 1 of `collection` with page size 1.
    fn first_record(&self, collection: &str) -> SyncResult<Option<StoredRecord>>;

    /// Load every record in `collection`.
    fn list_all(&self, collection: &str) -> SyncResult<Vec<StoredRecord>>;

    fn create(&self, collection: &str, payload: &Map<String, Value>) -> SyncResult<StoredRecord>;

    /// Patch the given fields of an existing record; other fields are untouched.
    fn update(
        &self,
        collection: &str,
        id: &str,
        payload: &Map<String, Value>,
    ) -> SyncResult<StoredRecord>;
}
