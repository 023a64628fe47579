//! In-process document store.
//!
//! Holds one collection in memory behind a `tokio::sync::RwLock`. Each
//! operation takes the lock exactly once, so every single operation is
//! atomic, but sequences of operations are not.
//!
//! Used by tests and by `STORE_BACKEND=memory`. The store can be switched
//! into an unavailable state to exercise fault paths.

use super::{compare_field_values, Document, DocumentStore, Filter, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

/// Document store backed by process memory.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    collection: String,
    documents: RwLock<Vec<Document>>,
    counters: Mutex<HashMap<String, i64>>,
    unavailable: AtomicBool,
}

impl MemoryDocumentStore {
    /// Create an empty store for `collection`.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            documents: RwLock::new(Vec::new()),
            counters: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent operation fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn check_available(
        &self,
        operation: &'static str,
        filter: Option<&Filter>,
    ) -> Result<(), StoreError> {
        if !self.unavailable.load(Ordering::SeqCst) {
            return Ok(());
        }
        let detail = match filter {
            Some(filter) => format!("filter {filter}: store unavailable"),
            None => "store unavailable".to_string(),
        };
        Err(StoreError::new(operation, self.collection.clone(), detail))
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError> {
        self.check_available("find_one", Some(filter))?;
        let documents = self.documents.read().await;
        Ok(documents.iter().find(|d| filter.matches(d)).cloned())
    }

    async fn find_all(
        &self,
        filter: &Filter,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        self.check_available("find_all", Some(filter))?;
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|d| filter.matches(d))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn find_one_sorted(
        &self,
        filter: &Filter,
        sort_key: &str,
        descending: bool,
    ) -> Result<Option<Document>, StoreError> {
        self.check_available("find_one_sorted", Some(filter))?;
        let documents = self.documents.read().await;
        let matching = documents.iter().filter(|d| filter.matches(d));

        let extreme = if descending {
            matching.max_by(|a, b| compare_field_values(a.get(sort_key), b.get(sort_key)))
        } else {
            matching.min_by(|a, b| compare_field_values(a.get(sort_key), b.get(sort_key)))
        };

        Ok(extreme.cloned())
    }

    async fn insert_one(&self, document: Document) -> Result<(), StoreError> {
        self.check_available("insert_one", None)?;
        self.documents.write().await.push(document);
        Ok(())
    }

    async fn delete_one(&self, filter: &Filter) -> Result<u64, StoreError> {
        self.check_available("delete_one", Some(filter))?;
        let mut documents = self.documents.write().await;
        match documents.iter().position(|d| filter.matches(d)) {
            Some(index) => {
                documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn increment_counter(&self, name: &str, seed: i64) -> Result<i64, StoreError> {
        self.check_available("increment_counter", None)?;
        let mut counters = self.counters.lock().await;
        let value = match counters.get(name) {
            Some(current) => current.checked_add(1).ok_or_else(|| {
                StoreError::new(
                    "increment_counter",
                    self.collection.clone(),
                    format!("counter {name} overflowed at {current}"),
                )
            })?,
            None => seed,
        };
        counters.insert(name.to_string(), value);
        Ok(value)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available("ping", None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn seeded_store() -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new("UserAssignments");
        for (id, owner) in [(3, "user1"), (1, "user2"), (2, "user1")] {
            store
                .insert_one(doc(json!({"assignment_id": id, "owner": owner})))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_find_one_returns_none_when_nothing_matches() {
        let store = seeded_store().await;

        let found = store
            .find_one(&Filter::new().eq("assignment_id", 99i64))
            .await
            .unwrap();
        assert!(found.is_none());

        let found = store
            .find_one(&Filter::new().eq("assignment_id", 2i64))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["owner"], "user1");
    }

    #[tokio::test]
    async fn test_find_all_filters_and_limits() {
        let store = seeded_store().await;

        let user1 = store
            .find_all(&Filter::new().eq("owner", "user1"), None)
            .await
            .unwrap();
        assert_eq!(user1.len(), 2);

        let limited = store.find_all(&Filter::new(), Some(2)).await.unwrap();
        assert_eq!(limited.len(), 2);

        let none = store
            .find_all(&Filter::new().eq("owner", "nobody"), None)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_find_one_sorted_picks_extremes() {
        let store = seeded_store().await;

        let max = store
            .find_one_sorted(&Filter::new(), "assignment_id", true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(max["assignment_id"], 3);

        let min = store
            .find_one_sorted(&Filter::new(), "assignment_id", false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(min["assignment_id"], 1);

        let empty = MemoryDocumentStore::new("Empty");
        let none = empty
            .find_one_sorted(&Filter::new(), "assignment_id", true)
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_delete_one_removes_at_most_one() {
        let store = seeded_store().await;

        let removed = store
            .delete_one(&Filter::new().eq("owner", "user1"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 2);

        let removed = store
            .delete_one(&Filter::new().eq("owner", "nobody"))
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_increment_counter_seeds_then_increments() {
        let store = MemoryDocumentStore::new("UserAssignments");

        assert_eq!(store.increment_counter("assignment_id", 5).await.unwrap(), 5);
        assert_eq!(store.increment_counter("assignment_id", 5).await.unwrap(), 6);
        assert_eq!(store.increment_counter("assignment_id", 100).await.unwrap(), 7);
        assert_eq!(store.increment_counter("other", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_increment_counter_overflow_is_store_error() {
        let store = MemoryDocumentStore::new("UserAssignments");

        assert_eq!(
            store.increment_counter("assignment_id", i64::MAX).await.unwrap(),
            i64::MAX
        );

        let err = store
            .increment_counter("assignment_id", i64::MAX)
            .await
            .unwrap_err();
        assert_eq!(err.operation, "increment_counter");
        assert!(err.detail.contains("overflowed"));

        // The counter is left at its last value
        assert!(store.increment_counter("assignment_id", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_increment_counter_is_atomic_under_concurrency() {
        let store = Arc::new(MemoryDocumentStore::new("UserAssignments"));

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.increment_counter("assignment_id", 1).await })
            })
            .collect();

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap().unwrap());
        }
        values.sort_unstable();

        assert_eq!(values, (1..=64).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_operation() {
        let store = seeded_store().await;
        store.set_unavailable(true);

        let err = store
            .find_one(&Filter::new().eq("assignment_id", 1i64))
            .await
            .unwrap_err();
        assert_eq!(err.operation, "find_one");
        assert!(err.detail.contains("assignment_id"));

        assert!(store.find_all(&Filter::new(), None).await.is_err());
        assert!(store.insert_one(Document::new()).await.is_err());
        assert!(store.delete_one(&Filter::new()).await.is_err());
        assert!(store.ping().await.is_err());

        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
        assert_eq!(store.len().await, 3);
    }
}
