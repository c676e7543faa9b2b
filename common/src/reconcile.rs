//! Reconcile one source item against the record store.

use crate::config::Collections;
use crate::entity::{EntitySpec, FieldSource, KeyPart, Lookup};
use crate::relation::{Relations, composite_key, key_part};
use crate::store::{Filter, RecordStore, StoredRecord};
use crate::{SyncResult, Verdict};
use itertools::Itertools;
use log::{error, info, warn};
use serde_json::{Map, Value};

/// Everything one item needs to reach the store.
pub struct SyncContext<'a> {
    pub store: &'a dyn RecordStore,
    pub relations: &'a mut Relations,
    pub collections: &'a Collections,
}

/// Read a dotted path such as `results.agree` out of a source item.
#[must_use]
pub fn value_at<'v>(item: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(item, |value, segment| value.get(segment))
}

/// Compare two JSON values the way the store sees them.
///
/// Types must match, so `"0"` and `0` differ. Numbers compare by value,
/// so `5` and `5.0` are equal. Objects treat a missing key as `null`.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => x
            .keys()
            .chain(y.keys())
            .all(|k| values_equal(x.get(k).unwrap_or(&Value::Null), y.get(k).unwrap_or(&Value::Null))),
        _ => a == b,
    }
}

/// Owned fields whose payload value differs from the stored one.
#[must_use]
pub fn changed_fields<'s>(
    spec: &'s EntitySpec,
    payload: &Map<String, Value>,
    existing: &StoredRecord,
) -> Vec<&'s str> {
    spec.owned_fields()
        .filter(|field| {
            let wanted = payload.get(*field).unwrap_or(&Value::Null);
            let stored = existing.get(field).unwrap_or(&Value::Null);
            !values_equal(wanted, stored)
        })
        .collect()
}

/// Human-readable identity of an item for log lines.
#[must_use]
pub fn item_label(spec: &EntitySpec, item: &Value) -> String {
    if spec.label.is_empty() {
        return spec.kind.to_string();
    }
    spec.label
        .iter()
        .map(|path| value_at(item, path).and_then(key_part).unwrap_or_else(|| "?".to_string()))
        .join("/")
}

fn relation_key(item: &Value, parts: &[KeyPart], ctx: &mut SyncContext<'_>) -> Option<String> {
    let parts: Option<Vec<String>> = parts
        .iter()
        .map(|part| match *part {
            KeyPart::Path(path) => value_at(item, path).and_then(key_part),
            KeyPart::Resolved(relation, path) => {
                let natural = value_at(item, path).and_then(key_part)?;
                ctx.relations.resolve(ctx.store, relation, &natural)
            }
        })
        .collect();
    parts.map(|p| composite_key(&p))
}

/// Build the allow-listed payload, resolving relations to store ids.
/// Unresolved relations are left `null` with a warning.
pub fn build_payload(
    spec: &EntitySpec,
    item: &Value,
    label: &str,
    ctx: &mut SyncContext<'_>,
) -> Map<String, Value> {
    let mut payload = Map::new();
    for field in spec.fields {
        let value = match field.source {
            FieldSource::Path(path) => value_at(item, path).cloned().unwrap_or(Value::Null),
            FieldSource::Relation { relation, key } => {
                match relation_key(item, key, ctx)
                    .and_then(|k| ctx.relations.resolve(ctx.store, relation, &k))
                {
                    Some(id) => Value::String(id),
                    None => {
                        warn!(
                            "{} {label}: no {relation:?} found for {}, leaving it empty",
                            spec.kind, field.name
                        );
                        Value::Null
                    }
                }
            }
        };
        payload.insert(field.name.to_string(), value);
    }
    payload
}

/// How a natural-key lookup can proceed for one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyLookup {
    /// Every key field has a value.
    Filter(Filter),
    /// Only relation fields are empty. Nothing stored can match.
    Unresolved(Vec<&'static str>),
    /// A key field read straight from the item is empty.
    Missing(Vec<&'static str>),
}

/// Decide how to look up the stored counterpart of `payload`.
///
/// An empty relation never takes part in a filter, since `party=null` would
/// match every record whose relation is also empty.
#[must_use]
pub fn natural_key_lookup(
    spec: &EntitySpec,
    key: &'static [&'static str],
    payload: &Map<String, Value>,
) -> KeyLookup {
    let empty = |k: &&str| payload.get(*k).is_none_or(Value::is_null);
    let (unresolved, missing): (Vec<&'static str>, Vec<&'static str>) = key
        .iter()
        .copied()
        .filter(empty)
        .partition(|k| spec.is_relation(k));

    if !missing.is_empty() {
        return KeyLookup::Missing(missing);
    }
    if !unresolved.is_empty() {
        return KeyLookup::Unresolved(unresolved);
    }
    KeyLookup::Filter(key.iter().fold(Filter::default(), |filter, k| {
        filter.and(k, payload.get(*k).cloned().unwrap_or(Value::Null))
    }))
}

/// Outcome of one attempt, before store errors are folded into `Failed`.
enum Attempt {
    Done(Verdict),
    MissingKey(Vec<&'static str>),
}

fn try_sync_item(
    spec: &EntitySpec,
    item: &Value,
    label: &str,
    ctx: &mut SyncContext<'_>,
) -> SyncResult<Attempt> {
    let collections = ctx.collections;
    let collection = collections.name(spec.collection);
    let payload = build_payload(spec, item, label, ctx);

    let existing = match spec.lookup {
        Lookup::Singleton => ctx.store.first_record(collection)?,
        Lookup::NaturalKey(key) => match natural_key_lookup(spec, key, &payload) {
            KeyLookup::Filter(filter) => ctx.store.find_first(collection, &filter)?,
            KeyLookup::Unresolved(fields) => {
                warn!(
                    "{} {label}: {} unresolved, not matching against stored records",
                    spec.kind,
                    fields.join(", ")
                );
                None
            }
            KeyLookup::Missing(fields) => return Ok(Attempt::MissingKey(fields)),
        },
    };

    let verdict = match existing {
        Some(existing) => {
            let changed = changed_fields(spec, &payload, &existing);
            if changed.is_empty() {
                info!("[skipped] {} {label}: no change", spec.kind);
                Verdict::Skipped
            } else {
                let patch: Map<String, Value> = changed
                    .iter()
                    .map(|f| ((*f).to_string(), payload.get(*f).cloned().unwrap_or(Value::Null)))
                    .collect();
                ctx.store.update(collection, &existing.id, &patch)?;
                info!("[updated] {} {label}: {}", spec.kind, changed.join(", "));
                Verdict::Updated
            }
        }
        None if spec.create => {
            let created = ctx.store.create(collection, &payload)?;
            info!("[created] {} {label} as {}", spec.kind, created.id);
            Verdict::Created
        }
        None => {
            info!("[skipped] {} {label}: not in {collection} yet", spec.kind);
            Verdict::Skipped
        }
    };
    Ok(Attempt::Done(verdict))
}

/// Reconcile one item. Store errors are logged and counted as a failure;
/// they never stop the batch.
pub fn sync_item(spec: &EntitySpec, item: &Value, ctx: &mut SyncContext<'_>) -> Verdict {
    let label = item_label(spec, item);
    match try_sync_item(spec, item, &label, ctx) {
        Ok(Attempt::Done(verdict)) => verdict,
        Ok(Attempt::MissingKey(fields)) => {
            error!(
                "[failed] {} {label}: item has no value for {}",
                spec.kind,
                fields.join(", ")
            );
            Verdict::Failed
        }
        Err(e) => {
            error!("[failed] {} {label}: {e}", spec.kind);
            Verdict::Failed
        }
    }
}
