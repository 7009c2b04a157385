//! In-memory reference implementation of [`Datastore`].
//!
//! Serves as the default backend for development and as the storage double
//! for the test suite. A `tokio` RwLock over the collection map gives
//! per-document atomicity for single writes; concurrent updates to the same
//! document are last-writer-wins, matching the trait contract.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Condition, Datastore, Document, Filter, FindOptions, Populate, StoreError};

/// Parse an ISO-8601 date or date-time string into UTC.
pub fn parse_iso_datetime(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> Value {
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    fn new_id() -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn create(&self, collection: &str, mut doc: Document) -> Result<Document, StoreError> {
        let now = Self::now();
        doc.entry("id".to_string())
            .or_insert_with(|| Value::String(Self::new_id()));
        doc.entry("createdAt".to_string()).or_insert_with(|| now.clone());
        doc.insert("lastUpdated".to_string(), now);

        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let mut docs: Vec<Document> = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matches(d, filter)).cloned().collect())
            .unwrap_or_default();

        if let Some(order_by) = options.order_by.as_deref() {
            sort_documents(&mut docs, order_by);
        }

        let docs = docs
            .into_iter()
            .skip(options.skip as usize)
            .take(options.limit.map(|l| l as usize).unwrap_or(usize::MAX))
            .map(|doc| project(doc, &options.select))
            .map(|doc| expand_references(&collections, doc, &options.populate))
            .collect();

        Ok(docs)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, filter)))
            .cloned())
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
        populate: &[Populate],
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| document_id(d) == Some(id)))
            .map(|doc| expand_references(&collections, doc.clone(), populate)))
    }

    async fn count_documents(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matches(d, filter)).count() as u64)
            .unwrap_or(0))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| document_id(d) == Some(id)))
        else {
            return Ok(None);
        };

        for (key, value) in patch {
            doc.insert(key, value);
        }
        doc.insert("lastUpdated".to_string(), Self::now());
        Ok(Some(doc.clone()))
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let Some(index) = docs.iter().position(|d| document_id(d) == Some(id)) else {
            return Ok(false);
        };
        docs.remove(index);
        Ok(true)
    }
}

fn document_id(doc: &Document) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}

fn matches(doc: &Document, filter: &Filter) -> bool {
    filter
        .iter()
        .all(|(field, condition)| condition_matches(doc.get(field).unwrap_or(&Value::Null), condition))
}

fn condition_matches(value: &Value, condition: &Condition) -> bool {
    match condition {
        Condition::Eq(expected) => values_equal(value, expected),
        Condition::Contains(needle) => string_match(value, needle, |s, n| s.contains(n)),
        Condition::StartsWith(needle) => string_match(value, needle, |s, n| s.starts_with(n)),
        Condition::EndsWith(needle) => string_match(value, needle, |s, n| s.ends_with(n)),
        Condition::All(elements) => value.as_array().is_some_and(|stored| {
            elements
                .iter()
                .all(|e| stored.iter().any(|v| values_equal(v, e)))
        }),
        Condition::NotIn(elements) => match value {
            Value::Array(stored) => stored
                .iter()
                .all(|v| !elements.iter().any(|e| values_equal(v, e))),
            other => !elements.iter().any(|e| values_equal(other, e)),
        },
        Condition::Lt(bound) => matches!(compare(value, bound), Some(Ordering::Less)),
        Condition::Lte(bound) => {
            matches!(compare(value, bound), Some(Ordering::Less | Ordering::Equal))
        }
        Condition::Gt(bound) => matches!(compare(value, bound), Some(Ordering::Greater)),
        Condition::Gte(bound) => matches!(
            compare(value, bound),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Condition::Between(low, high) => {
            matches!(compare(value, low), Some(Ordering::Greater | Ordering::Equal))
                && matches!(compare(value, high), Some(Ordering::Less | Ordering::Equal))
        }
    }
}

fn string_match(value: &Value, needle: &str, op: impl Fn(&str, &str) -> bool) -> bool {
    value
        .as_str()
        .is_some_and(|s| op(&s.to_lowercase(), &needle.to_lowercase()))
}

/// Equality that treats 10 and 10.0 as the same number and lets `null`
/// match an absent field.
fn values_equal(a: &Value, b: &Value) -> bool {
    if a.is_number() && b.is_number() {
        return a.as_f64() == b.as_f64();
    }
    a == b
}

/// Ordered comparison over numbers, booleans, and strings. String pairs that
/// both parse as ISO-8601 dates compare chronologically.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_number() && b.is_number() {
        return a.as_f64()?.partial_cmp(&b.as_f64()?);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => {
            match (parse_iso_datetime(x), parse_iso_datetime(y)) {
                (Some(dx), Some(dy)) => Some(dx.cmp(&dy)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn sort_documents(docs: &mut [Document], order_by: &str) {
    let (field, descending) = match order_by.strip_prefix('-') {
        Some(field) => (field, true),
        None => (order_by, false),
    };

    docs.sort_by(|a, b| {
        let va = a.get(field).unwrap_or(&Value::Null);
        let vb = b.get(field).unwrap_or(&Value::Null);
        let ordering = compare(va, vb).unwrap_or(Ordering::Equal);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

fn project(doc: Document, select: &[String]) -> Document {
    if select.is_empty() {
        return doc;
    }
    doc.into_iter()
        .filter(|(key, _)| key == "id" || select.iter().any(|s| s == key))
        .collect()
}

fn expand_references(
    collections: &HashMap<String, Vec<Document>>,
    mut doc: Document,
    populate: &[Populate],
) -> Document {
    for spec in populate {
        let Some(value) = doc.get(&spec.field).cloned() else {
            continue;
        };
        let expanded = expand_value(collections, &value, spec);
        doc.insert(spec.field.clone(), expanded);
    }
    doc
}

fn expand_value(
    collections: &HashMap<String, Vec<Document>>,
    value: &Value,
    spec: &Populate,
) -> Value {
    match value {
        Value::String(id) => collections
            .get(&spec.collection)
            .and_then(|docs| docs.iter().find(|d| document_id(d) == Some(id)))
            .map(|doc| {
                let select = spec.select.clone().unwrap_or_default();
                Value::Object(project(doc.clone(), &select))
            })
            // Dangling references stay as the raw id.
            .unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| expand_value(collections, item, spec))
                .collect(),
        ),
        _ => value.clone(),
    }
}
