//! # ragmill
//!
//! A retrieval-augmented question answering pipeline: documents are
//! chunked, embedded, and stored in a vector store; questions are
//! answered by retrieving relevant chunks and prompting a generation
//! capability with them.
//!
//! ## Architecture
//!
//! ```text
//! write path:  text ──▶ chunker ──▶ embedder ──▶ vector store
//! read path:   question ──▶ embedder ──▶ similarity search ──▶ prompt ──▶ generator
//! ```
//!
//! Embedding and generation are opaque external HTTP capabilities; the
//! store is pluggable (in-memory or SQLite). Ingestion tolerates
//! at-least-once delivery through idempotent upsert-by-id, and batches
//! make forward progress under partial failures.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline error taxonomy |
//! | [`chunk`] | Overlapping character-window chunker |
//! | [`embedding`] | Embedding gateway and vector utilities |
//! | [`generation`] | Generation gateway |
//! | [`store`] | Vector store trait and backends |
//! | [`ingest`] | Ingestion pipeline (direct + delivery modes) |
//! | [`answer`] | Retrieval-augmented answering pipeline |
//! | [`server`] | HTTP entry points |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod server;
pub mod store;
