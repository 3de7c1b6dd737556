//! Ingestion pipeline orchestration.
//!
//! Coordinates the write path: record → chunking → embedding → upsert.
//! Two entry modes share the same per-record machinery:
//!
//! - **Direct** ([`IngestionPipeline::ingest_direct`]): one record,
//!   always re-chunked, documents keyed by derived ids
//!   (`"{source_id}:{index}"`).
//! - **Delivery** ([`IngestionPipeline::ingest_delivery`]): a bounded
//!   batch from an at-least-once transport. Each message body is raw
//!   text or a JSON envelope `{"text", "id"}`. Granularity follows the
//!   configured [`ChunkPolicy`]: re-chunk every record, or trust the
//!   producer's bounds and store each record as a single document keyed
//!   by the caller id.
//!
//! Records are processed independently and failures are recorded per
//! record (and per chunk for partial store failures); one bad record
//! never short-circuits the batch. Re-ingesting the same (id, text) is
//! idempotent because the store upserts by id.

use std::sync::Arc;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::chunk::split;
use crate::config::{ChunkPolicy, ChunkingConfig};
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::models::{Chunk, DeliveryMessage, IngestReport, StoredDocument, TextRecord};
use crate::store::VectorStore;

/// Optional JSON envelope accepted as a delivery message body.
#[derive(Debug, Deserialize)]
struct Envelope {
    text: String,
    #[serde(default)]
    id: Option<String>,
}

pub struct IngestionPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chunking: ChunkingConfig,
}

impl IngestionPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            chunking,
        }
    }

    /// Direct-mode entry: one record, re-chunked regardless of the
    /// delivery policy, documents keyed by derived chunk ids.
    pub async fn ingest_direct(&self, record: TextRecord) -> IngestReport {
        self.ingest_records(vec![record], ChunkPolicy::Rechunk).await
    }

    /// Delivery-mode entry: decode each message body, then ingest the
    /// decoded records under the configured chunk policy. Decode
    /// failures are per-message `invalid_input` entries; the rest of the
    /// batch proceeds.
    pub async fn ingest_delivery(&self, messages: Vec<DeliveryMessage>) -> IngestReport {
        let mut report = IngestReport::default();
        let mut records = Vec::with_capacity(messages.len());

        for message in messages {
            match decode_body(&message) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(message_id = %message.id, error = %err, "delivery message rejected");
                    report.record_failure(&message.id, &err);
                }
            }
        }

        let ingested = self.ingest_records(records, self.chunking.policy).await;
        report.merge(ingested);
        report
    }

    /// Ingest a batch of already-decoded records. Every record is
    /// attempted; the report carries per-record outcomes.
    pub async fn ingest_records(
        &self,
        records: Vec<TextRecord>,
        policy: ChunkPolicy,
    ) -> IngestReport {
        let mut report = IngestReport::default();

        for record in &records {
            match self.ingest_record(record, policy).await {
                Ok((succeeded, chunk_failures)) => {
                    report.succeeded.extend(succeeded);
                    for err in &chunk_failures {
                        report.record_failure(&record.id, err);
                    }
                }
                Err(err) => {
                    warn!(record_id = %record.id, error = %err, "record ingestion failed");
                    report.record_failure(&record.id, &err);
                }
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "ingestion batch complete"
        );
        report
    }

    /// Process one record: granulate, embed in order, upsert with
    /// partial-failure isolation. Returns the upserted document ids and
    /// any per-chunk store rejections; a whole-record failure (empty
    /// text, embedding outage) is the outer error.
    async fn ingest_record(
        &self,
        record: &TextRecord,
        policy: ChunkPolicy,
    ) -> Result<(Vec<String>, Vec<PipelineError>), PipelineError> {
        if record.raw_text.trim().is_empty() {
            return Err(PipelineError::invalid_input("text must not be empty"));
        }

        // (document id, chunk) pairs in sequence order.
        let keyed_chunks: Vec<(String, Chunk)> = match policy {
            ChunkPolicy::Rechunk => split(
                &record.id,
                &record.raw_text,
                self.chunking.max_chars,
                self.chunking.overlap_chars,
            )?
            .into_iter()
            .map(|c| (c.derived_id(), c))
            .collect(),
            ChunkPolicy::TrustCaller => {
                // The producer already bounded this record; store it
                // whole under the caller-supplied id.
                let chunk = Chunk {
                    source_id: record.id.clone(),
                    sequence_index: 0,
                    text: record.raw_text.clone(),
                    overlap_with_predecessor: String::new(),
                };
                vec![(record.id.clone(), chunk)]
            }
        };

        let texts: Vec<String> = keyed_chunks.iter().map(|(_, c)| c.text.clone()).collect();
        let vectors = self.embedder.embed_many(&texts).await?;
        if vectors.len() != keyed_chunks.len() {
            return Err(PipelineError::embedding(format!(
                "embedding count mismatch: {} chunks, {} vectors",
                keyed_chunks.len(),
                vectors.len()
            )));
        }

        let docs: Vec<StoredDocument> = keyed_chunks
            .into_iter()
            .zip(vectors)
            .map(|((id, chunk), vector)| StoredDocument {
                id,
                text: chunk.text.clone(),
                vector,
                metadata: Some(serde_json::json!({
                    "source_id": chunk.source_id,
                    "sequence_index": chunk.sequence_index,
                    "content_hash": content_hash(&chunk.text),
                })),
            })
            .collect();

        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        for outcome in self.store.upsert_many(docs).await {
            match outcome {
                Ok(id) => succeeded.push(id),
                Err(err) => failures.push(err),
            }
        }
        Ok((succeeded, failures))
    }
}

/// Decode a delivery message body into a [`TextRecord`].
///
/// A body starting with `{` must be a valid JSON envelope; anything else
/// is taken as raw text keyed by the transport message id.
fn decode_body(message: &DeliveryMessage) -> Result<TextRecord, PipelineError> {
    let body = message.body.trim_start();
    if body.starts_with('{') {
        let envelope: Envelope = serde_json::from_str(body).map_err(|e| {
            PipelineError::invalid_input(format!("invalid JSON envelope: {}", e))
        })?;
        let id = envelope.id.unwrap_or_else(|| message.id.clone());
        Ok(TextRecord::new(id, envelope.text))
    } else {
        Ok(TextRecord::new(message.id.clone(), message.body.clone()))
    }
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
