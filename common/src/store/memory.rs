//! An in-memory record store for exercising the engine without a server.

use super::{Filter, RecordStore, StoredRecord};
use crate::reconcile::values_equal;
use crate::{SyncError, SyncResult};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct MemoryStore {
    collections: RefCell<HashMap<String, Vec<StoredRecord>>>,
    next_id: Cell<u32>,
    pub writes: Cell<u32>,
    pub lists: Cell<u32>,
    failing_collections: RefCell<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing the write counter. Returns its id.
    pub fn seed(&self, collection: &str, fields: Value) -> String {
        let id = self.allocate_id();
        let fields = match fields {
            Value::Object(map) => map,
            _ => panic!("seed fields must be an object"),
        };
        self.collections
            .borrow_mut()
            .entry(collection.to_string())
            .or_default()
            .push(StoredRecord {
                id: id.clone(),
                fields,
            });
        id
    }

    /// Make every request against `collection` fail.
    pub fn fail_collection(&self, collection: &str) {
        self.failing_collections
            .borrow_mut()
            .insert(collection.to_string());
    }

    pub fn records(&self, collection: &str) -> Vec<StoredRecord> {
        self.collections
            .borrow()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<StoredRecord> {
        self.records(collection).into_iter().find(|r| r.id == id)
    }

    fn allocate_id(&self) -> String {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        format!("rec{id:04}")
    }

    fn check(&self, collection: &str) -> SyncResult<()> {
        if self.failing_collections.borrow().contains(collection) {
            return Err(SyncError::Store(format!(
                "HTTP 500 from collection {collection}"
            )));
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn find_first(&self, collection: &str, filter: &Filter) -> SyncResult<Option<StoredRecord>> {
        self.check(collection)?;
        Ok(self.records(collection).into_iter().find(|record| {
            filter.clauses().iter().all(|(field, value)| {
                values_equal(record.get(field).unwrap_or(&Value::Null), value)
            })
        }))
    }

    fn first_record(&self, collection: &str) -> SyncResult<Option<StoredRecord>> {
        self.check(collection)?;
        Ok(self.records(collection).into_iter().next())
    }

    fn list_all(&self, collection: &str) -> SyncResult<Vec<StoredRecord>> {
        self.check(collection)?;
        self.lists.set(self.lists.get() + 1);
        Ok(self.records(collection))
    }

    fn create(&self, collection: &str, payload: &Map<String, Value>) -> SyncResult<StoredRecord> {
        self.check(collection)?;
        self.writes.set(self.writes.get() + 1);
        let record = StoredRecord {
            id: self.allocate_id(),
            fields: payload.clone(),
        };
        self.collections
            .borrow_mut()
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        payload: &Map<String, Value>,
    ) -> SyncResult<StoredRecord> {
        self.check(collection)?;
        self.writes.set(self.writes.get() + 1);
        let mut collections = self.collections.borrow_mut();
        let record = collections
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| SyncError::Store(format!("HTTP 404 for {collection}/{id}")))?;
        for (field, value) in payload {
            record.fields.insert(field.clone(), value.clone());
        }
        Ok(record.clone())
    }
}
