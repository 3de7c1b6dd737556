//! Embedding gateway: trait, HTTP provider, and vector utilities.
//!
//! The [`Embedder`] trait wraps the external embedding capability:
//! text in, fixed-dimension vector out, batch variant order-preserving.
//! The provider performs no retry policy of its own beyond transport
//! retries for rate limits and server errors; caller-level retry
//! decisions belong to the pipelines.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, ... (exponent capped at 2^5)
//!
//! Request deadlines come from configuration; an expired deadline is
//! reported with the `timed_out` flag set so callers can distinguish it
//! from a hard failure.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::CapabilityConfig;
use crate::error::PipelineError;

/// External embedding capability: text → fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;

    /// Embed a batch of texts, preserving input order. Derived chunk ids
    /// depend on this ordering guarantee.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;
}

/// Embedding provider speaking the OpenAI-style embeddings wire format.
///
/// Posts `{"model", "input"}` to `{url}/v1/embeddings` and reads the
/// `data[].embedding` arrays back in input order.
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl HttpEmbedder {
    /// Build a provider from configuration. The API key is read from the
    /// environment variable named by `api_key_env`, when set.
    pub fn from_config(config: &CapabilityConfig) -> Result<Self, PipelineError> {
        let api_key = match &config.api_key_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                PipelineError::embedding(format!("environment variable {} not set", var))
            })?),
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::embedding(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
        })
    }

    fn classify(&self, err: reqwest::Error) -> PipelineError {
        if err.is_timeout() {
            PipelineError::embedding_timeout(format!("embedding request timed out: {}", err))
        } else {
            PipelineError::embedding(format!("embedding request failed: {}", err))
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let vectors = self.embed_many(&[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::embedding("empty embedding response"))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(format!("{}/v1/embeddings", self.url))
                .header("Content-Type", "application/json")
                .json(&body);
            if let Some(key) = &self.api_key {
                request = request.header("Authorization", format!("Bearer {}", key));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| self.classify(e))?;
                        let vectors = parse_embeddings_response(&json)?;
                        if vectors.len() != texts.len() {
                            return Err(PipelineError::embedding(format!(
                                "embedding count mismatch: sent {} texts, got {} vectors",
                                texts.len(),
                                vectors.len()
                            )));
                        }
                        debug!(batch = texts.len(), model = %self.model, "embedded batch");
                        return Ok(vectors);
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        warn!(%status, attempt, "embedding service error, will retry");
                        last_err = Some(PipelineError::embedding(format!(
                            "embedding API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    // Client error (not 429): don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(PipelineError::embedding(format!(
                        "embedding API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    let classified = self.classify(e);
                    if classified.is_timeout() {
                        return Err(classified);
                    }
                    last_err = Some(classified);
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| PipelineError::embedding("embedding failed after retries")))
    }
}

/// Parse an OpenAI-style embeddings response: `data[].embedding` arrays
/// in input order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, PipelineError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| PipelineError::embedding("invalid embedding response: missing data array"))?;

    let mut vectors = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                PipelineError::embedding("invalid embedding response: missing embedding")
            })?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        vectors.push(vec);
    }

    Ok(vectors)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing a
/// BLOB of `vec.len() × 4` bytes. This is the persisted vector format of
/// the sqlite store backend.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`vec_to_blob`]: reads 4-byte little-endian `f32` values
/// from the byte slice.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`. Returns `0.0` for empty vectors or
/// vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn test_config(url: &str) -> CapabilityConfig {
        CapabilityConfig {
            url: url.to_string(),
            model: "test-embed".to_string(),
            api_key_env: None,
            timeout_secs: 5,
            max_retries: 1,
        }
    }

    #[tokio::test]
    async fn test_embed_many_preserves_order() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200).json_body(serde_json::json!({
                "data": [
                    {"embedding": [1.0, 0.0]},
                    {"embedding": [0.0, 1.0]},
                ]
            }));
        });

        let embedder = HttpEmbedder::from_config(&test_config(&server.base_url())).unwrap();
        let vectors = embedder
            .embed_many(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        mock.assert();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_client_error_fails_without_retry() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(401).body("bad key");
        });

        let embedder = HttpEmbedder::from_config(&test_config(&server.base_url())).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();

        mock.assert_hits(1);
        assert_eq!(err.code(), "embedding_service");
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_server_error_retries_then_fails() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(500).body("boom");
        });

        let embedder = HttpEmbedder::from_config(&test_config(&server.base_url())).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();

        // max_retries = 1: initial attempt plus one retry
        mock.assert_hits(2);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_count_mismatch_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/embeddings");
            then.status(200)
                .json_body(serde_json::json!({"data": [{"embedding": [1.0]}]}));
        });

        let embedder = HttpEmbedder::from_config(&test_config(&server.base_url())).unwrap();
        let err = embedder
            .embed_many(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "embedding_service");
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }
}
