//! Assignments repository.
//!
//! Typed CRUD over the assignment collection. Identifiers come from the
//! configured [`IdAllocator`]; the repository never trusts a caller-supplied
//! id.
//!
//! # Security
//!
//! - Candidates are validated before any store access
//! - Document bodies are not logged

use crate::allocator::{IdAllocator, ID_FIELD};
use crate::errors::AssignmentError;
use crate::models::{Assignment, NewAssignment, DEFAULT_LIST_LIMIT};
use crate::store::{Document, DocumentStore, Filter, StoreError};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// Repository for assignment documents.
#[derive(Clone)]
pub struct AssignmentRepository {
    store: Arc<dyn DocumentStore>,
    allocator: Arc<dyn IdAllocator>,
}

impl AssignmentRepository {
    pub fn new(store: Arc<dyn DocumentStore>, allocator: Arc<dyn IdAllocator>) -> Self {
        Self { store, allocator }
    }

    /// Fetch one assignment by identifier.
    ///
    /// # Errors
    ///
    /// `NotFound` when no document has this id, `Store` on store faults.
    #[instrument(skip_all, fields(assignment_id = id))]
    pub async fn get(&self, id: i64) -> Result<Assignment, AssignmentError> {
        let document = self
            .store
            .find_one(&Filter::new().eq(ID_FIELD, id))
            .await?
            .ok_or_else(|| AssignmentError::NotFound(format!("Assignment {id} not found")))?;

        self.decode(document)
    }

    /// All assignments belonging to `owner`. Empty when there are none.
    #[instrument(skip_all)]
    pub async fn list_by_owner(&self, owner: &str) -> Result<Vec<Assignment>, AssignmentError> {
        let documents = self
            .store
            .find_all(&Filter::new().eq("owner", owner), None)
            .await?;

        documents.into_iter().map(|d| self.decode(d)).collect()
    }

    /// Up to `limit` assignments across all owners (default 5).
    #[instrument(skip_all, fields(limit = ?limit))]
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<Assignment>, AssignmentError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let documents = self.store.find_all(&Filter::new(), Some(limit)).await?;

        documents.into_iter().map(|d| self.decode(d)).collect()
    }

    /// Validate, allocate an identifier and insert.
    ///
    /// Returns the stored assignment. Any id on the candidate is replaced by
    /// the allocated one.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty `name` or `owner` (nothing is written),
    /// `Allocation` when no id could be allocated, `Store` when the insert
    /// fails.
    #[instrument(skip_all)]
    pub async fn create(&self, candidate: NewAssignment) -> Result<Assignment, AssignmentError> {
        candidate
            .validate()
            .map_err(|reason| AssignmentError::Validation(reason.to_string()))?;

        let assignment_id = self.allocator.next_id().await?;
        let assignment = candidate.into_assignment(assignment_id);

        self.store.insert_one(self.encode(&assignment)?).await?;

        tracing::info!(
            target: "assignment.repository",
            assignment_id = assignment.assignment_id,
            allocator = %self.allocator.kind(),
            "Assignment created"
        );

        Ok(assignment)
    }

    /// Delete one assignment by identifier.
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing was removed.
    #[instrument(skip_all, fields(assignment_id = id))]
    pub async fn delete(&self, id: i64) -> Result<(), AssignmentError> {
        let removed = self
            .store
            .delete_one(&Filter::new().eq(ID_FIELD, id))
            .await?;

        if removed == 0 {
            return Err(AssignmentError::NotFound(format!("Assignment {id} not found")));
        }

        tracing::info!(target: "assignment.repository", assignment_id = id, "Assignment deleted");
        Ok(())
    }

    fn decode(&self, document: Document) -> Result<Assignment, AssignmentError> {
        let id = document.get(ID_FIELD).cloned().unwrap_or(Value::Null);
        serde_json::from_value(Value::Object(document)).map_err(|e| {
            AssignmentError::from(StoreError::new(
                "decode",
                self.store.collection(),
                format!("document with {ID_FIELD}={id}: {e}"),
            ))
        })
    }

    fn encode(&self, assignment: &Assignment) -> Result<Document, AssignmentError> {
        match serde_json::to_value(assignment) {
            Ok(Value::Object(document)) => Ok(document),
            Ok(_) => Err(StoreError::new(
                "encode",
                self.store.collection(),
                "assignment did not serialize to an object",
            )
            .into()),
            Err(e) => Err(StoreError::new("encode", self.store.collection(), e.to_string()).into()),
        }
    }
}
