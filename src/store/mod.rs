//! Vector store abstraction.
//!
//! The [`VectorStore`] trait defines the storage operations the
//! ingestion and answering pipelines need, enabling pluggable backends:
//!
//! - [`memory::InMemoryStore`] — brute-force cosine search behind an
//!   `RwLock`; used for tests and single-process deployments.
//! - [`sqlite::SqliteStore`] — sqlx pool over SQLite with vectors
//!   persisted as little-endian f32 BLOBs.
//!
//! # Contract
//!
//! - `upsert` is idempotent by document id: last writer wins, re-upserts
//!   never create duplicate retrievable entries. This is what makes
//!   at-least-once delivery tolerable upstream.
//! - `upsert_many` has partial-failure semantics: per-document outcomes,
//!   one rejected document never aborts the rest of the batch.
//! - `similarity_search` never errors on an empty store; it returns an
//!   empty result set.
//! - `ready` confirms the backend is usable within a bounded wait; it is
//!   called once per pipeline invocation before first use.
//!
//! Connection failures are [`StoreConnection`](PipelineError::StoreConnection)
//! (transient, retryable); per-document rejections are
//! [`StoreWrite`](PipelineError::StoreWrite) (not retryable unmodified).

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::PipelineError;
use crate::models::{ScoredDocument, StoredDocument};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Abstract vector store backend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Confirm the backend is reachable and usable, waiting at most
    /// `timeout`. Called once per pipeline invocation before first use.
    async fn ready(&self, timeout: Duration) -> Result<(), PipelineError>;

    /// Insert or replace a document, keyed by `doc.id`. Returns the id.
    async fn upsert(&self, doc: StoredDocument) -> Result<String, PipelineError>;

    /// Upsert a batch with per-document outcomes. The returned Vec is
    /// positionally aligned with the input; a failure at one position
    /// never prevents attempts at the others.
    async fn upsert_many(
        &self,
        docs: Vec<StoredDocument>,
    ) -> Vec<Result<String, PipelineError>>;

    /// Return up to `k` documents ordered by descending cosine
    /// similarity to `query`. An empty store yields an empty Vec.
    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredDocument>, PipelineError>;

    /// Total number of stored documents.
    async fn count(&self) -> Result<usize, PipelineError>;
}

/// Shared upsert validation: the per-document checks that make a
/// document malformed regardless of backend.
pub(crate) fn validate_document(
    doc: &StoredDocument,
    expected_dims: Option<usize>,
) -> Result<(), PipelineError> {
    if doc.id.trim().is_empty() {
        return Err(PipelineError::store_write(&doc.id, "document id is empty"));
    }
    if doc.vector.is_empty() {
        return Err(PipelineError::store_write(&doc.id, "document vector is empty"));
    }
    if let Some(dims) = expected_dims {
        if doc.vector.len() != dims {
            return Err(PipelineError::store_write(
                &doc.id,
                format!(
                    "vector has {} dimensions, store expects {}",
                    doc.vector.len(),
                    dims
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, vector: Vec<f32>) -> StoredDocument {
        StoredDocument {
            id: id.to_string(),
            text: "text".to_string(),
            vector,
            metadata: None,
        }
    }

    #[test]
    fn test_validate_rejects_empty_id() {
        let err = validate_document(&doc("", vec![1.0]), None).unwrap_err();
        assert_eq!(err.code(), "store_write");
    }

    #[test]
    fn test_validate_rejects_empty_vector() {
        let err = validate_document(&doc("d1", vec![]), None).unwrap_err();
        assert_eq!(err.code(), "store_write");
    }

    #[test]
    fn test_validate_enforces_dims_when_configured() {
        assert!(validate_document(&doc("d1", vec![1.0, 2.0]), Some(2)).is_ok());
        assert!(validate_document(&doc("d1", vec![1.0, 2.0]), None).is_ok());
        let err = validate_document(&doc("d1", vec![1.0]), Some(2)).unwrap_err();
        assert_eq!(err.code(), "store_write");
    }
}
