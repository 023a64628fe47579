//! Document store adapter.
//!
//! A [`DocumentStore`] wraps one logical collection of JSON documents and
//! exposes the handful of single-document operations the repository needs.
//! Two implementations exist:
//!
//! - [`PgDocumentStore`] - PostgreSQL JSONB rows (production)
//! - [`MemoryDocumentStore`] - in-process collection (tests, `STORE_BACKEND=memory`)
//!
//! "Not found" is never an error at this layer: lookups return `Option` and
//! deletes return a count. Every fault is a [`StoreError`] carrying the
//! operation and collection involved.

pub mod memory;
pub mod postgres;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// A stored document: a JSON object.
pub type Document = Map<String, Value>;

/// Failure of a store operation.
#[derive(Debug, Clone, Error)]
#[error("{operation} on collection '{collection}' failed: {detail}")]
pub struct StoreError {
    /// Store operation that failed (e.g. `find_one`, `insert_one`).
    pub operation: &'static str,
    /// Collection the operation targeted.
    pub collection: String,
    /// Underlying cause, including the filter where one applies.
    pub detail: String,
}

impl StoreError {
    pub fn new(
        operation: &'static str,
        collection: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            collection: collection.into(),
            detail: detail.into(),
        }
    }
}

/// Conjunction of field equality predicates.
///
/// An empty filter matches every document in the collection. Adding a second
/// predicate on the same field replaces the first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.clauses.iter_mut().find(|(f, _)| *f == field) {
            Some(clause) => clause.1 = value,
            None => self.clauses.push((field, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether `document` satisfies every predicate.
    pub fn matches(&self, document: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(field, value)| document.get(field) == Some(value))
    }

    /// JSON object form, used for JSONB containment queries.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.clauses
                .iter()
                .map(|(f, v)| (f.clone(), v.clone()))
                .collect(),
        )
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Order two optional field values the way the document store sorts them.
///
/// Missing and null values sort first, then numbers (numerically), then
/// strings (lexically). Any other type sorts last and compares equal.
pub(crate) fn compare_field_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(_) => 3,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Persistence operations against one collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the collection this store wraps.
    fn collection(&self) -> &str;

    /// First document matching `filter`, if any.
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError>;

    /// All documents matching `filter`, at most `limit` when given.
    ///
    /// Order is whatever the backend returns.
    async fn find_all(
        &self,
        filter: &Filter,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError>;

    /// The matching document with the greatest (or least) `sort_key`.
    async fn find_one_sorted(
        &self,
        filter: &Filter,
        sort_key: &str,
        descending: bool,
    ) -> Result<Option<Document>, StoreError>;

    /// Persist a new document. Returns only once the write is acknowledged.
    async fn insert_one(&self, document: Document) -> Result<(), StoreError>;

    /// Remove at most one matching document, returning how many were removed.
    async fn delete_one(&self, filter: &Filter) -> Result<u64, StoreError>;

    /// Atomically increment a named counter and return the new value.
    ///
    /// A counter that does not exist yet is created holding `seed`, and
    /// `seed` is returned.
    async fn increment_counter(&self, name: &str, seed: i64) -> Result<i64, StoreError>;

    /// Check connectivity.
    async fn ping(&self) -> Result<(), StoreError>;
}
