//! Core data models used throughout ragmill.
//!
//! These types represent the records, chunks, and stored documents that
//! flow through the ingestion and answering pipelines.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;

/// A raw text record entering the ingestion pipeline.
///
/// Created once at the pipeline entry and consumed once; the id is
/// either caller-supplied (delivery mode) or generated (direct mode).
#[derive(Debug, Clone)]
pub struct TextRecord {
    pub id: String,
    pub raw_text: String,
}

impl TextRecord {
    pub fn new(id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_text: raw_text.into(),
        }
    }

    /// Build a record with a generated id, for direct-mode ingestion
    /// where the caller supplied none.
    pub fn anonymous(raw_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            raw_text: raw_text.into(),
        }
    }
}

/// A bounded segment of a [`TextRecord`], the unit of embedding.
///
/// Derived deterministically by [`crate::chunk::split`]; never persisted
/// independently of its embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Id of the originating [`TextRecord`].
    pub source_id: String,
    /// Zero-based position within the source's chunk sequence.
    pub sequence_index: usize,
    /// The chunk text, at most `max_chunk_size` characters.
    pub text: String,
    /// The leading characters this chunk shares with its predecessor.
    /// Empty for the first chunk.
    pub overlap_with_predecessor: String,
}

impl Chunk {
    /// Derived storage key: `"{source_id}:{sequence_index}"`.
    pub fn derived_id(&self) -> String {
        format!("{}:{}", self.source_id, self.sequence_index)
    }
}

/// A document as held by the vector store: text plus its embedding.
///
/// Lifecycle: created or overwritten by upsert (idempotent by `id`, last
/// writer wins), read by similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// One similarity-search hit: a stored document and its score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    pub id: String,
    pub text: String,
    /// Cosine similarity to the query vector, in `[-1.0, 1.0]`.
    pub score: f32,
}

/// One message in a batched delivery (e.g. from a queue consumer).
///
/// The body is either raw text or a JSON envelope `{"text": ..,
/// "id": ..}`; decoding happens in the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryMessage {
    pub id: String,
    pub body: String,
}

/// A per-record failure inside an [`IngestReport`].
#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    /// Id of the record that failed (not the derived chunk id).
    pub record_id: String,
    /// Stable error code from [`PipelineError::code`].
    pub code: String,
    pub message: String,
}

/// Outcome of one ingestion invocation.
///
/// Records are processed independently; a failure on one never aborts
/// the others, so both lists can be non-empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Ids of documents successfully upserted into the store.
    pub succeeded: Vec<String>,
    pub failed: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn record_failure(&mut self, record_id: impl Into<String>, err: &PipelineError) {
        self.failed.push(IngestFailure {
            record_id: record_id.into(),
            code: err.code().to_string(),
            message: err.to_string(),
        });
    }

    pub fn merge(&mut self, other: IngestReport) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }

    pub fn is_fully_successful(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The answering pipeline's result: the generated text, verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub text: String,
}
