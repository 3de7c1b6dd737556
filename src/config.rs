//! TOML configuration parsing and validation.
//!
//! All deployment knobs live in one TOML file: store backend and
//! namespace, chunking policy and window sizes, embedding/generation
//! endpoints, retrieval depth, delivery batch bound, and the server bind
//! address. See `config/ragmill.example.toml` for a full example.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub embedding: CapabilityConfig,
    pub generation: CapabilityConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    pub server: ServerConfig,
}

/// Vector store connection parameters.
///
/// Everything the adapter needs is configuration, never hardcoded:
/// backend selection, database path, and the collection (table)
/// namespace documents live in.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `"memory"` or `"sqlite"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Database file path (sqlite backend only).
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Collection namespace; becomes the table name for sqlite.
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Expected embedding dimensionality. When set, documents with a
    /// different vector length are rejected at upsert.
    #[serde(default)]
    pub dims: Option<usize>,
    /// Bounded wait for the readiness check performed before first use.
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

fn default_backend() -> String {
    "memory".to_string()
}
fn default_collection() -> String {
    "documents".to_string()
}
fn default_ready_timeout_secs() -> u64 {
    5
}

/// How delivery-mode records are granulated before embedding.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkPolicy {
    /// Apply the chunker to every record.
    Rechunk,
    /// Treat each record as one pre-bounded chunk, keyed by the caller id.
    TrustCaller,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    #[serde(default)]
    pub overlap_chars: usize,
    /// Delivery-mode granularity switch. Direct-mode ingestion always
    /// re-chunks regardless of this setting.
    #[serde(default = "default_policy")]
    pub policy: ChunkPolicy,
}

fn default_policy() -> ChunkPolicy {
    ChunkPolicy::Rechunk
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved as answer context.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

/// Connection settings for one opaque HTTP capability (embedding or
/// generation): endpoint, model identifier, credentials, deadline.
#[derive(Debug, Deserialize, Clone)]
pub struct CapabilityConfig {
    /// Base URL of the service, e.g. `https://api.openai.com`.
    pub url: String,
    /// Provider-assigned model identifier.
    pub model: String,
    /// Name of the environment variable holding the API key. Unset means
    /// the endpoint is unauthenticated.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Transport-level retries for 429/5xx responses.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    /// Largest accepted delivery batch; mirrors the upstream transport's
    /// batch bound.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_batch: default_max_batch(),
        }
    }
}

fn default_max_batch() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be smaller than chunking.max_chars");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.delivery.max_batch == 0 {
        anyhow::bail!("delivery.max_batch must be >= 1");
    }

    match config.store.backend.as_str() {
        "memory" => {}
        "sqlite" => {
            if config.store.path.is_none() {
                anyhow::bail!("store.path is required for the sqlite backend");
            }
        }
        other => anyhow::bail!("Unknown store backend: '{}'. Must be memory or sqlite.", other),
    }
    if !config
        .store
        .collection
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
        || config.store.collection.is_empty()
    {
        anyhow::bail!("store.collection must be a non-empty [A-Za-z0-9_] identifier");
    }

    for (section, cap) in [
        ("embedding", &config.embedding),
        ("generation", &config.generation),
    ] {
        if cap.url.trim().is_empty() {
            anyhow::bail!("{}.url must not be empty", section);
        }
        if cap.model.trim().is_empty() {
            anyhow::bail!("{}.model must not be empty", section);
        }
    }

    Ok(config)
}
