//! In-memory [`VectorStore`] implementation.
//!
//! Documents live in a `HashMap` behind `std::sync::RwLock`; similarity
//! search is brute-force cosine over all stored vectors. Suitable for
//! tests and small single-process deployments.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::PipelineError;
use crate::models::{ScoredDocument, StoredDocument};

use super::{validate_document, VectorStore};

/// In-memory store keyed by document id.
pub struct InMemoryStore {
    dims: Option<usize>,
    docs: RwLock<HashMap<String, StoredDocument>>,
}

impl InMemoryStore {
    /// Create a store. When `dims` is set, upserts with a different
    /// vector length are rejected as malformed.
    pub fn new(dims: Option<usize>) -> Self {
        Self {
            dims,
            docs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ready(&self, _timeout: Duration) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn upsert(&self, doc: StoredDocument) -> Result<String, PipelineError> {
        validate_document(&doc, self.dims)?;
        let id = doc.id.clone();
        let mut docs = self
            .docs
            .write()
            .map_err(|_| PipelineError::store_connection("store lock poisoned"))?;
        docs.insert(id.clone(), doc);
        Ok(id)
    }

    async fn upsert_many(
        &self,
        docs: Vec<StoredDocument>,
    ) -> Vec<Result<String, PipelineError>> {
        let mut outcomes = Vec::with_capacity(docs.len());
        for doc in docs {
            outcomes.push(self.upsert(doc).await);
        }
        outcomes
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredDocument>, PipelineError> {
        let docs = self
            .docs
            .read()
            .map_err(|_| PipelineError::store_connection("store lock poisoned"))?;

        let mut hits: Vec<ScoredDocument> = docs
            .values()
            .map(|doc| ScoredDocument {
                id: doc.id.clone(),
                text: doc.text.clone(),
                score: cosine_similarity(query, &doc.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        let docs = self
            .docs
            .read()
            .map_err(|_| PipelineError::store_connection("store lock poisoned"))?;
        Ok(docs.len())
    }
}
