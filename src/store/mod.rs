//! Storage collaborator boundary.
//!
//! The CRUD layer talks to storage through [`Datastore`], a document-store
//! interface: JSON documents grouped into named collections, queried with a
//! typed [`Filter`]. The backend owns all persisted record state and the
//! system fields (`id`, `createdAt`, `lastUpdated`); handlers hold no
//! cross-request state. Single-document writes are atomic; there are no
//! cross-record transactions, and concurrent updates to one record are
//! last-writer-wins.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;

/// One stored record: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, Value>;

/// A single per-field constraint inside a [`Filter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Exact equality. `Eq(Null)` matches both null and absent values.
    Eq(Value),
    /// Case-insensitive substring match on string values.
    Contains(String),
    /// Case-insensitive prefix match.
    StartsWith(String),
    /// Case-insensitive suffix match.
    EndsWith(String),
    /// The stored array must contain every supplied element.
    All(Vec<Value>),
    /// The stored value (or any element of a stored array) must match none
    /// of the supplied elements.
    NotIn(Vec<Value>),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    /// Inclusive range.
    Between(Value, Value),
}

/// Conjunction of per-field conditions, the unit passed to query methods.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: BTreeMap<String, Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single equality constraint.
    pub fn field_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with(field, Condition::Eq(value.into()))
    }

    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.conditions.insert(field.into(), condition);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, condition: Condition) {
        self.conditions.insert(field.into(), condition);
    }

    pub fn get(&self, field: &str) -> Option<&Condition> {
        self.conditions.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Condition)> {
        self.conditions.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Single-level expansion of a reference field at read time.
#[derive(Debug, Clone)]
pub struct Populate {
    /// Field holding the referenced id (or an array of ids).
    pub field: String,
    /// Collection the ids point into.
    pub collection: String,
    /// Projection applied to the expanded document, `None` for all fields.
    pub select: Option<Vec<String>>,
}

/// Query modifiers for [`Datastore::find`].
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Sort field; a leading `-` selects descending order.
    pub order_by: Option<String>,
    /// Field projection; empty means all fields. `id` is always retained.
    pub select: Vec<String>,
    pub skip: u64,
    pub limit: Option<u64>,
    pub populate: Vec<Populate>,
}

impl FindOptions {
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Document-store collaborator consumed by the CRUD handlers.
///
/// Implementations own the record system fields: `create` assigns `id` and
/// stamps `createdAt`/`lastUpdated`; `update` merges the patch and resets
/// `lastUpdated`. Field uniqueness is *not* a backend guarantee here; the
/// CRUD layer performs a best-effort check-then-act lookup, so backends
/// wanting a hard constraint must add their own unique index.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn create(&self, collection: &str, doc: Document) -> Result<Document, StoreError>;

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError>;

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError>;

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
        populate: &[Populate],
    ) -> Result<Option<Document>, StoreError>;

    /// Total match count for `filter`, unaffected by pagination.
    async fn count_documents(&self, collection: &str, filter: &Filter)
        -> Result<u64, StoreError>;

    /// Merge `patch` onto the identified document. Returns the updated
    /// document, or `None` when the id does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
    ) -> Result<Option<Document>, StoreError>;

    /// Returns whether a document was deleted.
    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}
