//! PostgreSQL document store.
//!
//! Documents live in the `documents` table as JSONB, one row per document,
//! partitioned by the `collection` column. Filters are evaluated with JSONB
//! containment (`body @> filter`), which is served by the GIN index on `body`.
//!
//! # Security
//!
//! - All queries use parameterized statements
//! - Document bodies are not logged

use super::{Document, DocumentStore, Filter, StoreError};
use crate::observability::metrics::record_store_operation;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;

/// Document store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    collection: String,
}

impl PgDocumentStore {
    /// Wrap `collection` in the database reachable through `pool`.
    pub fn new(pool: PgPool, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
        }
    }

    fn error(
        &self,
        operation: &'static str,
        filter: Option<&Filter>,
        err: sqlx::Error,
    ) -> StoreError {
        let detail = match filter {
            Some(filter) => format!("filter {filter}: {err}"),
            None => err.to_string(),
        };
        StoreError::new(operation, self.collection.clone(), detail)
    }

    fn record<T, E>(&self, operation: &str, result: &Result<T, E>, start: Instant) {
        let status = if result.is_ok() { "success" } else { "error" };
        record_store_operation(operation, status, start.elapsed());
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    #[instrument(skip_all, fields(collection = %self.collection))]
    async fn find_one(&self, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let start = Instant::now();
        let result: Result<Option<(Json<Document>,)>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT body
            FROM documents
            WHERE collection = $1 AND body @> $2
            ORDER BY doc_id
            LIMIT 1
            "#,
        )
        .bind(&self.collection)
        .bind(Json(filter.to_json()))
        .fetch_optional(&self.pool)
        .await;
        self.record("find_one", &result, start);

        let row = result.map_err(|e| self.error("find_one", Some(filter), e))?;
        Ok(row.map(|(Json(body),)| body))
    }

    #[instrument(skip_all, fields(collection = %self.collection))]
    async fn find_all(
        &self,
        filter: &Filter,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        // LIMIT NULL means no limit
        let limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));

        let start = Instant::now();
        let result: Result<Vec<(Json<Document>,)>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT body
            FROM documents
            WHERE collection = $1 AND body @> $2
            ORDER BY doc_id
            LIMIT $3
            "#,
        )
        .bind(&self.collection)
        .bind(Json(filter.to_json()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        self.record("find_all", &result, start);

        let rows = result.map_err(|e| self.error("find_all", Some(filter), e))?;
        Ok(rows.into_iter().map(|(Json(body),)| body).collect())
    }

    #[instrument(skip_all, fields(collection = %self.collection, sort_key = %sort_key))]
    async fn find_one_sorted(
        &self,
        filter: &Filter,
        sort_key: &str,
        descending: bool,
    ) -> Result<Option<Document>, StoreError> {
        // jsonb ordering compares numbers numerically; NULLS FIRST/LAST keeps
        // documents without the key on the "small" side in both directions.
        let sql = if descending {
            r#"
            SELECT body
            FROM documents
            WHERE collection = $1 AND body @> $2
            ORDER BY body -> $3 DESC NULLS LAST, doc_id DESC
            LIMIT 1
            "#
        } else {
            r#"
            SELECT body
            FROM documents
            WHERE collection = $1 AND body @> $2
            ORDER BY body -> $3 ASC NULLS FIRST, doc_id ASC
            LIMIT 1
            "#
        };

        let start = Instant::now();
        let result: Result<Option<(Json<Document>,)>, sqlx::Error> = sqlx::query_as(sql)
            .bind(&self.collection)
            .bind(Json(filter.to_json()))
            .bind(sort_key)
            .fetch_optional(&self.pool)
            .await;
        self.record("find_one_sorted", &result, start);

        let row = result.map_err(|e| self.error("find_one_sorted", Some(filter), e))?;
        Ok(row.map(|(Json(body),)| body))
    }

    #[instrument(skip_all, fields(collection = %self.collection))]
    async fn insert_one(&self, document: Document) -> Result<(), StoreError> {
        let start = Instant::now();
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, body)
            VALUES ($1, $2)
            "#,
        )
        .bind(&self.collection)
        .bind(Json(document))
        .execute(&self.pool)
        .await;
        self.record("insert_one", &result, start);

        let rows = result
            .map_err(|e| self.error("insert_one", None, e))?
            .rows_affected();

        if rows != 1 {
            return Err(StoreError::new(
                "insert_one",
                self.collection.clone(),
                format!("write not acknowledged ({rows} rows affected)"),
            ));
        }

        Ok(())
    }

    #[instrument(skip_all, fields(collection = %self.collection))]
    async fn delete_one(&self, filter: &Filter) -> Result<u64, StoreError> {
        let start = Instant::now();
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE doc_id = (
                SELECT doc_id
                FROM documents
                WHERE collection = $1 AND body @> $2
                ORDER BY doc_id
                LIMIT 1
                FOR UPDATE
            )
            "#,
        )
        .bind(&self.collection)
        .bind(Json(filter.to_json()))
        .execute(&self.pool)
        .await;
        self.record("delete_one", &result, start);

        let rows = result
            .map_err(|e| self.error("delete_one", Some(filter), e))?
            .rows_affected();

        Ok(rows)
    }

    #[instrument(skip_all, fields(collection = %self.collection, counter = %name))]
    async fn increment_counter(&self, name: &str, seed: i64) -> Result<i64, StoreError> {
        // Single statement: the upsert takes a row lock, so concurrent callers
        // serialize on the counter row and each observes a distinct value.
        let start = Instant::now();
        let result: Result<(i64,), sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO document_counters (collection, name, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, name) DO UPDATE
            SET value = document_counters.value + 1,
                updated_at = NOW()
            RETURNING value
            "#,
        )
        .bind(&self.collection)
        .bind(name)
        .bind(seed)
        .fetch_one(&self.pool)
        .await;
        self.record("increment_counter", &result, start);

        let (value,) = result.map_err(|e| self.error("increment_counter", None, e))?;
        Ok(value)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| self.error("ping", None, e))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    //! These tests need a PostgreSQL instance (DATABASE_URL). Run them with
    //! `cargo test -- --ignored`.

    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn test_insert_and_find(pool: PgPool) -> Result<(), StoreError> {
        let store = PgDocumentStore::new(pool, "UserAssignments");

        store
            .insert_one(doc(json!({"assignment_id": 1, "owner": "user1", "name": "Essay"})))
            .await?;
        store
            .insert_one(doc(json!({"assignment_id": 2, "owner": "user2", "name": "Quiz"})))
            .await?;

        let found = store
            .find_one(&Filter::new().eq("assignment_id", 2i64))
            .await?
            .unwrap();
        assert_eq!(found.get("name"), Some(&json!("Quiz")));

        let missing = store
            .find_one(&Filter::new().eq("assignment_id", 3i64))
            .await?;
        assert!(missing.is_none());

        let user1 = store
            .find_all(&Filter::new().eq("owner", "user1"), None)
            .await?;
        assert_eq!(user1.len(), 1);

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn test_find_one_sorted_is_numeric(pool: PgPool) -> Result<(), StoreError> {
        let store = PgDocumentStore::new(pool, "UserAssignments");

        for id in [9, 10, 2] {
            store.insert_one(doc(json!({"assignment_id": id}))).await?;
        }

        let max = store
            .find_one_sorted(&Filter::new(), "assignment_id", true)
            .await?
            .unwrap();
        assert_eq!(max.get("assignment_id"), Some(&json!(10)));

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn test_collections_are_isolated(pool: PgPool) -> Result<(), StoreError> {
        let a = PgDocumentStore::new(pool.clone(), "A");
        let b = PgDocumentStore::new(pool, "B");

        a.insert_one(doc(json!({"assignment_id": 1}))).await?;

        assert!(b.find_all(&Filter::new(), None).await?.is_empty());
        assert_eq!(b.delete_one(&Filter::new()).await?, 0);
        assert_eq!(a.delete_one(&Filter::new()).await?, 1);

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn test_delete_waits_for_locked_row(pool: PgPool) -> Result<(), StoreError> {
        let store = PgDocumentStore::new(pool.clone(), "UserAssignments");
        store.insert_one(doc(json!({"assignment_id": 1}))).await?;

        // Another transaction holds the row, then rolls back
        let mut tx = pool.begin().await.unwrap();
        sqlx::query("SELECT doc_id FROM documents WHERE collection = $1 FOR UPDATE")
            .bind("UserAssignments")
            .execute(&mut *tx)
            .await
            .unwrap();

        let deleter = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .delete_one(&Filter::new().eq("assignment_id", 1i64))
                    .await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(!deleter.is_finished());

        tx.rollback().await.unwrap();
        assert_eq!(deleter.await.unwrap()?, 1);
        assert!(store.find_all(&Filter::new(), None).await?.is_empty());

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires PostgreSQL"]
    async fn test_increment_counter(pool: PgPool) -> Result<(), StoreError> {
        let store = PgDocumentStore::new(pool, "UserAssignments");

        assert_eq!(store.increment_counter("assignment_id", 4).await?, 4);
        assert_eq!(store.increment_counter("assignment_id", 4).await?, 5);

        Ok(())
    }
}
