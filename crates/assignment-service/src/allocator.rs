//! Assignment identifier allocation.
//!
//! Two strategies are available, selected by `ID_ALLOCATOR`:
//!
//! - [`MaxScanAllocator`] reads the current maximum `assignment_id` and adds
//!   one. The read and the subsequent insert are separate store operations,
//!   so two concurrent creates can observe the same maximum and receive the
//!   same identifier.
//! - [`CounterAllocator`] seeds a store-side counter from the current maximum
//!   once, then allocates with a single atomic `increment_counter` call.
//!   Concurrent allocations are unique.

use crate::errors::AssignmentError;
use crate::observability::metrics::record_id_allocation;
use crate::store::{DocumentStore, Filter, StoreError};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::instrument;

/// Document field holding the identifier.
pub const ID_FIELD: &str = "assignment_id";

/// Default first identifier for an empty collection.
pub const DEFAULT_ID_START: i64 = 1;

/// Allocation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocatorKind {
    MaxScan,
    #[default]
    Counter,
}

impl AllocatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocatorKind::MaxScan => "max_scan",
            AllocatorKind::Counter => "counter",
        }
    }
}

impl fmt::Display for AllocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "max_scan" => Ok(AllocatorKind::MaxScan),
            "counter" => Ok(AllocatorKind::Counter),
            other => Err(format!("unknown allocator '{other}' (expected max_scan or counter)")),
        }
    }
}

/// Produces identifiers for new assignments.
#[async_trait]
pub trait IdAllocator: Send + Sync {
    /// Next identifier to assign.
    async fn next_id(&self) -> Result<i64, AssignmentError>;

    /// Strategy name, used as a metric label.
    fn kind(&self) -> AllocatorKind;
}

/// Build the allocator selected by `kind` over `store`.
pub fn build_allocator(
    kind: AllocatorKind,
    store: Arc<dyn DocumentStore>,
    start: i64,
) -> Arc<dyn IdAllocator> {
    match kind {
        AllocatorKind::MaxScan => Arc::new(MaxScanAllocator::new(store, start)),
        AllocatorKind::Counter => Arc::new(CounterAllocator::new(store, start)),
    }
}

/// Current maximum identifier plus one, or `start` for an empty collection.
async fn next_after_max(
    store: &dyn DocumentStore,
    start: i64,
    kind: AllocatorKind,
) -> Result<i64, AssignmentError> {
    let Some(document) = store
        .find_one_sorted(&Filter::new(), ID_FIELD, true)
        .await
        .map_err(|e| allocation_error(kind, &e))?
    else {
        return Ok(start);
    };

    match document.get(ID_FIELD).and_then(serde_json::Value::as_i64) {
        Some(max) => match max.checked_add(1) {
            Some(next) => Ok(next.max(start)),
            None => {
                record_id_allocation(kind.as_str(), "error");
                Err(AssignmentError::Allocation(format!(
                    "{kind} allocation failed: identifier space exhausted at {max}"
                )))
            }
        },
        // Highest-sorting document has no integer id, so no integer ids exist.
        None => Ok(start),
    }
}

fn allocation_error(kind: AllocatorKind, err: &StoreError) -> AssignmentError {
    record_id_allocation(kind.as_str(), "error");
    AssignmentError::Allocation(format!("{kind} allocation failed: {err}"))
}

/// Read-max-then-increment allocator.
pub struct MaxScanAllocator {
    store: Arc<dyn DocumentStore>,
    start: i64,
}

impl MaxScanAllocator {
    pub fn new(store: Arc<dyn DocumentStore>, start: i64) -> Self {
        Self { store, start }
    }
}

#[async_trait]
impl IdAllocator for MaxScanAllocator {
    #[instrument(skip_all, name = "assignment.allocator.max_scan")]
    async fn next_id(&self) -> Result<i64, AssignmentError> {
        let id = next_after_max(self.store.as_ref(), self.start, self.kind()).await?;

        record_id_allocation(self.kind().as_str(), "success");
        tracing::debug!(target: "assignment.allocator", assignment_id = id, "Allocated identifier");
        Ok(id)
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::MaxScan
    }
}

/// Store-side atomic counter allocator.
///
/// The counter is seeded from the collection on first use in this process.
/// If the counter already exists in the store the seed is ignored.
pub struct CounterAllocator {
    store: Arc<dyn DocumentStore>,
    start: i64,
    seed: OnceCell<i64>,
}

impl CounterAllocator {
    pub fn new(store: Arc<dyn DocumentStore>, start: i64) -> Self {
        Self {
            store,
            start,
            seed: OnceCell::new(),
        }
    }
}

#[async_trait]
impl IdAllocator for CounterAllocator {
    #[instrument(skip_all, name = "assignment.allocator.counter")]
    async fn next_id(&self) -> Result<i64, AssignmentError> {
        let seed = *self
            .seed
            .get_or_try_init(|| next_after_max(self.store.as_ref(), self.start, self.kind()))
            .await?;

        let id = self
            .store
            .increment_counter(ID_FIELD, seed)
            .await
            .map_err(|e| allocation_error(self.kind(), &e))?;

        record_id_allocation(self.kind().as_str(), "success");
        tracing::debug!(target: "assignment.allocator", assignment_id = id, "Allocated identifier");
        Ok(id)
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::Counter
    }
}

/// Test doubles for [`IdAllocator`].
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    /// Allocator returning consecutive identifiers from a fixed start.
    pub struct MockIdAllocator {
        next: AtomicI64,
        call_count: AtomicUsize,
        return_error: bool,
    }

    impl MockIdAllocator {
        /// Allocate `start`, `start + 1`, ...
        pub fn starting_at(start: i64) -> Self {
            Self {
                next: AtomicI64::new(start),
                call_count: AtomicUsize::new(0),
                return_error: false,
            }
        }

        /// Fail every allocation.
        pub fn failing() -> Self {
            Self {
                next: AtomicI64::new(DEFAULT_ID_START),
                call_count: AtomicUsize::new(0),
                return_error: true,
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdAllocator for MockIdAllocator {
        async fn next_id(&self) -> Result<i64, AssignmentError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.return_error {
                return Err(AssignmentError::Allocation(
                    "mock allocator failure".to_string(),
                ));
            }
            Ok(self.next.fetch_add(1, Ordering::SeqCst))
        }

        fn kind(&self) -> AllocatorKind {
            AllocatorKind::Counter
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::{Document, MemoryDocumentStore};
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn store_with_ids(ids: &[i64]) -> Arc<MemoryDocumentStore> {
        let store = Arc::new(MemoryDocumentStore::new("UserAssignments"));
        for id in ids {
            store
                .insert_one(doc(json!({"assignment_id": id, "owner": "user1"})))
                .await
                .unwrap();
        }
        store
    }

    #[test]
    fn test_allocator_kind_parse() {
        assert_eq!("max_scan".parse::<AllocatorKind>(), Ok(AllocatorKind::MaxScan));
        assert_eq!("counter".parse::<AllocatorKind>(), Ok(AllocatorKind::Counter));
        assert!("random".parse::<AllocatorKind>().is_err());
        assert_eq!(AllocatorKind::default(), AllocatorKind::Counter);
        assert_eq!(AllocatorKind::MaxScan.to_string(), "max_scan");
    }

    #[tokio::test]
    async fn test_max_scan_empty_collection_starts_at_one() {
        let store = store_with_ids(&[]).await;
        let allocator = MaxScanAllocator::new(store, DEFAULT_ID_START);

        assert_eq!(allocator.next_id().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_max_scan_returns_max_plus_one() {
        let store = store_with_ids(&[4, 9, 2]).await;
        let allocator = MaxScanAllocator::new(store, DEFAULT_ID_START);

        assert_eq!(allocator.next_id().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_max_scan_repeats_until_insert() {
        let store = store_with_ids(&[1]).await;
        let allocator = MaxScanAllocator::new(store, DEFAULT_ID_START);

        // Nothing inserted between calls, so the answer does not move.
        assert_eq!(allocator.next_id().await.unwrap(), 2);
        assert_eq!(allocator.next_id().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_custom_start_value() {
        let store = store_with_ids(&[]).await;
        let max_scan = MaxScanAllocator::new(store.clone(), 100);
        let counter = CounterAllocator::new(store, 100);

        assert_eq!(max_scan.next_id().await.unwrap(), 100);
        assert_eq!(counter.next_id().await.unwrap(), 100);
        assert_eq!(counter.next_id().await.unwrap(), 101);
    }

    #[tokio::test]
    async fn test_counter_seeds_from_existing_max() {
        let store = store_with_ids(&[3, 7]).await;
        let allocator = CounterAllocator::new(store.clone(), DEFAULT_ID_START);

        assert_eq!(allocator.next_id().await.unwrap(), 8);
        // Advances without any insert in between.
        assert_eq!(allocator.next_id().await.unwrap(), 9);
        assert_eq!(allocator.next_id().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_counter_concurrent_allocations_are_unique() {
        let store = store_with_ids(&[5]).await;
        let allocator = Arc::new(CounterAllocator::new(store, DEFAULT_ID_START));

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                tokio::spawn(async move { allocator.next_id().await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }
        ids.sort_unstable();

        assert_eq!(ids, (6..56).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_max_scan_at_id_ceiling_is_allocation_error() {
        let store = store_with_ids(&[i64::MAX]).await;
        let allocator = MaxScanAllocator::new(store, DEFAULT_ID_START);

        let err = allocator.next_id().await.unwrap_err();
        assert!(matches!(err, AssignmentError::Allocation(_)));
        assert!(err.to_string().contains("exhausted"));
    }

    #[tokio::test]
    async fn test_counter_seed_at_id_ceiling_is_allocation_error() {
        let store = store_with_ids(&[i64::MAX]).await;
        let allocator = CounterAllocator::new(store, DEFAULT_ID_START);

        let err = allocator.next_id().await.unwrap_err();
        assert!(matches!(err, AssignmentError::Allocation(_)));
    }

    #[tokio::test]
    async fn test_counter_starting_at_id_ceiling_fails_after_first() {
        let store = store_with_ids(&[]).await;
        let allocator = CounterAllocator::new(store, i64::MAX);

        assert_eq!(allocator.next_id().await.unwrap(), i64::MAX);

        let err = allocator.next_id().await.unwrap_err();
        assert!(matches!(err, AssignmentError::Allocation(_)));
        assert!(err.to_string().contains("increment_counter"));
    }

    #[tokio::test]
    async fn test_unavailable_store_is_allocation_error() {
        let store = store_with_ids(&[1]).await;
        store.set_unavailable(true);

        let max_scan = MaxScanAllocator::new(store.clone(), DEFAULT_ID_START);
        let err = max_scan.next_id().await.unwrap_err();
        assert!(matches!(err, AssignmentError::Allocation(_)));
        assert!(err.to_string().contains("find_one_sorted"));

        let counter = CounterAllocator::new(store, DEFAULT_ID_START);
        let err = counter.next_id().await.unwrap_err();
        assert!(matches!(err, AssignmentError::Allocation(_)));
    }

    #[tokio::test]
    async fn test_counter_retries_seed_after_failure() {
        let store = store_with_ids(&[2]).await;
        let allocator = CounterAllocator::new(store.clone(), DEFAULT_ID_START);

        store.set_unavailable(true);
        assert!(allocator.next_id().await.is_err());

        store.set_unavailable(false);
        assert_eq!(allocator.next_id().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_build_allocator_selects_strategy() {
        let store: Arc<dyn DocumentStore> = store_with_ids(&[]).await;

        let allocator = build_allocator(AllocatorKind::MaxScan, store.clone(), 1);
        assert_eq!(allocator.kind(), AllocatorKind::MaxScan);

        let allocator = build_allocator(AllocatorKind::Counter, store, 1);
        assert_eq!(allocator.kind(), AllocatorKind::Counter);
    }

    #[tokio::test]
    async fn test_mock_allocator() {
        let mock = mock::MockIdAllocator::starting_at(40);
        assert_eq!(mock.next_id().await.unwrap(), 40);
        assert_eq!(mock.next_id().await.unwrap(), 41);
        assert_eq!(mock.call_count(), 2);

        let failing = mock::MockIdAllocator::failing();
        assert!(failing.next_id().await.is_err());
        assert_eq!(failing.call_count(), 1);
    }
}
