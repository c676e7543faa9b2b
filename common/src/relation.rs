//! Run-scoped caches resolving natural keys of referenced records to store ids.

use crate::config::{Collection, Collections};
use crate::store::{RecordStore, StoredRecord};
use itertools::Itertools;
use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;

/// A collection other records point at.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Relation {
    Province,
    Party,
    Area,
}

impl Relation {
    #[must_use]
    pub fn collection(self) -> Collection {
        match self {
            Relation::Province => Collection::Provinces,
            Relation::Party => Collection::Parties,
            Relation::Area => Collection::Areas,
        }
    }

    /// Stored fields that make up this relation's natural key.
    #[must_use]
    pub fn key_fields(self) -> &'static [&'static str] {
        match self {
            Relation::Province | Relation::Party => &["name"],
            Relation::Area => &["province", "areaNumber"],
        }
    }
}

/// Render a JSON scalar as a key component. Integral numbers lose any
/// fractional part so that `3`, `3.0` and `"3"` produce the same key.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn key_part(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0) {
                Some((f as i64).to_string())
            } else {
                Some(n.to_string())
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Join key components the same way on both the stored and the source side.
#[must_use]
pub fn composite_key(parts: &[String]) -> String {
    parts.iter().join("_")
}

fn record_key(record: &StoredRecord, fields: &[&str]) -> Option<String> {
    let parts: Option<Vec<String>> = fields
        .iter()
        .map(|f| record.get(f).and_then(key_part))
        .collect();
    parts.map(|p| composite_key(&p))
}

/// Natural key → store id for one collection, loaded on first use.
#[derive(Debug)]
pub struct RelationCache {
    collection: String,
    key_fields: &'static [&'static str],
    entries: Option<HashMap<String, String>>,
}

impl RelationCache {
    #[must_use]
    pub fn new(collection: &str, key_fields: &'static [&'static str]) -> Self {
        Self {
            collection: collection.to_string(),
            key_fields,
            entries: None,
        }
    }

    /// A cache that is already loaded with the given entries.
    #[must_use]
    pub fn preloaded<I, K, V>(collection: &str, key_fields: &'static [&'static str], entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            collection: collection.to_string(),
            key_fields,
            entries: Some(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.entries.is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, HashMap::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the store id for `key`, loading the collection on first call.
    /// A failed load leaves the cache empty for the rest of the run.
    pub fn resolve(&mut self, store: &dyn RecordStore, key: &str) -> Option<String> {
        let entries = self
            .entries
            .get_or_insert_with(|| load_all(store, &self.collection, self.key_fields));
        entries.get(key).cloned()
    }
}

fn load_all(
    store: &dyn RecordStore,
    collection: &str,
    key_fields: &[&str],
) -> HashMap<String, String> {
    match store.list_all(collection) {
        Ok(records) => {
            let entries: HashMap<String, String> = records
                .iter()
                .filter_map(|r| record_key(r, key_fields).map(|k| (k, r.id.clone())))
                .collect();
            debug!("Cached {} {collection} keys", entries.len());
            entries
        }
        Err(e) => {
            warn!("Could not load {collection} for relation lookups, continuing without: {e}");
            HashMap::new()
        }
    }
}

/// Every relation cache used by one run.
#[derive(Debug)]
pub struct Relations {
    caches: HashMap<Relation, RelationCache>,
}

impl Relations {
    #[must_use]
    pub fn new(collections: &Collections) -> Self {
        let caches = [Relation::Province, Relation::Party, Relation::Area]
            .into_iter()
            .map(|r| {
                let cache = RelationCache::new(collections.name(r.collection()), r.key_fields());
                (r, cache)
            })
            .collect();
        Self { caches }
    }

    /// Replace the cache for `relation`, e.g. with a preloaded one.
    pub fn insert(&mut self, relation: Relation, cache: RelationCache) {
        self.caches.insert(relation, cache);
    }

    pub fn resolve(
        &mut self,
        store: &dyn RecordStore,
        relation: Relation,
        key: &str,
    ) -> Option<String> {
        self.caches
            .get_mut(&relation)
            .and_then(|cache| cache.resolve(store, key))
    }
}
