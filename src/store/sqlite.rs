//! SQLite [`VectorStore`] backed by an sqlx connection pool.
//!
//! The pool is acquired once and reused for the process lifetime, never
//! re-opened per call. Vectors are persisted as little-endian f32 BLOBs
//! ([`vec_to_blob`]); similarity search loads candidate rows and scores
//! them with brute-force cosine, which is adequate for the corpus sizes
//! this pipeline targets.
//!
//! The table name comes from `store.collection` in configuration. It is
//! validated at config load to a `[A-Za-z0-9_]` identifier because table
//! names cannot be bound as SQL parameters.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::debug;

use crate::config::StoreConfig;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::PipelineError;
use crate::models::{ScoredDocument, StoredDocument};

use super::{validate_document, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
    collection: String,
    dims: Option<usize>,
}

impl SqliteStore {
    /// Open (or create) the database, switch to WAL, and create the
    /// collection table when missing. Idempotent.
    pub async fn connect(config: &StoreConfig) -> Result<Self, PipelineError> {
        let path = config.path.as_ref().ok_or_else(|| {
            PipelineError::store_connection("store.path is required for the sqlite backend")
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PipelineError::store_connection(format!("failed to create data directory: {}", e))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| PipelineError::store_connection(format!("invalid database path: {}", e)))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(connection_error)?;

        let store = Self {
            pool,
            collection: config.collection.clone(),
            dims: config.dims,
        };
        store.create_schema().await?;
        debug!(collection = %store.collection, path = %path.display(), "sqlite store connected");
        Ok(store)
    }

    async fn create_schema(&self) -> Result<(), PipelineError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                vector BLOB NOT NULL,
                metadata_json TEXT
            )",
            self.collection
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(connection_error)?;
        Ok(())
    }

    /// Close the pool. Called on process shutdown; dropping the store
    /// without closing is safe but skips the WAL checkpoint.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn connection_error(e: sqlx::Error) -> PipelineError {
    PipelineError::store_connection(format!("sqlite error: {}", e))
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn ready(&self, timeout: Duration) -> Result<(), PipelineError> {
        let probe = sqlx::query("SELECT 1").execute(&self.pool);
        match tokio::time::timeout(timeout, probe).await {
            Ok(result) => result.map(|_| ()).map_err(connection_error),
            Err(_) => Err(PipelineError::store_connection_timeout(format!(
                "store readiness check exceeded {:?}",
                timeout
            ))),
        }
    }

    async fn upsert(&self, doc: StoredDocument) -> Result<String, PipelineError> {
        validate_document(&doc, self.dims)?;

        let metadata_json = doc
            .metadata
            .as_ref()
            .map(|m| m.to_string());

        let sql = format!(
            "INSERT INTO {} (id, text, vector, metadata_json) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                vector = excluded.vector,
                metadata_json = excluded.metadata_json",
            self.collection
        );

        sqlx::query(&sql)
            .bind(&doc.id)
            .bind(&doc.text)
            .bind(vec_to_blob(&doc.vector))
            .bind(metadata_json)
            .execute(&self.pool)
            .await
            .map_err(connection_error)?;

        Ok(doc.id)
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
        let sql = format!("SELECT id, text, vector FROM {}", self.collection);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(connection_error)?;

        let mut hits: Vec<ScoredDocument> = rows
            .into_iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("vector");
                ScoredDocument {
                    id: row.get("id"),
                    text: row.get("text"),
                    score: cosine_similarity(query, &blob_to_vec(&blob)),
                }
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
        let sql = format!("SELECT COUNT(*) AS n FROM {}", self.collection);
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(connection_error)?;
        let n: i64 = row.get("n");
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store_config(dir: &TempDir) -> StoreConfig {
        StoreConfig {
            backend: "sqlite".to_string(),
            path: Some(dir.path().join("ragmill.sqlite")),
            collection: "documents".to_string(),
            dims: Some(2),
            ready_timeout_secs: 5,
        }
    }

    fn doc(id: &str, vector: Vec<f32>, text: &str) -> StoredDocument {
        StoredDocument {
            id: id.to_string(),
            text: text.to_string(),
            vector,
            metadata: Some(serde_json::json!({"source_id": id})),
        }
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_and_ready() {
        let dir = TempDir::new().unwrap();
        let config = test_store_config(&dir);
        let store = SqliteStore::connect(&config).await.unwrap();
        store.ready(Duration::from_secs(5)).await.unwrap();
        store.close().await;

        // Second connect against the same file re-runs the DDL safely.
        let store = SqliteStore::connect(&config).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        store.close().await;
    }

    #[tokio::test]
    async fn test_upsert_roundtrip_and_idempotence() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::connect(&test_store_config(&dir)).await.unwrap();

        store.upsert(doc("d1", vec![1.0, 0.0], "first")).await.unwrap();
        store.upsert(doc("d1", vec![1.0, 0.0], "replaced")).await.unwrap();
        store.upsert(doc("d2", vec![0.0, 1.0], "other")).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let hits = store.similarity_search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].id, "d1");
        assert_eq!(hits[0].text, "replaced");
        store.close().await;
    }

    #[tokio::test]
    async fn test_partial_failure_in_batch() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::connect(&test_store_config(&dir)).await.unwrap();

        let outcomes = store
            .upsert_many(vec![
                doc("ok", vec![1.0, 0.0], "fine"),
                doc("bad", vec![1.0, 0.0, 0.0], "dims mismatch"),
            ])
            .await;

        assert!(outcomes[0].is_ok());
        assert_eq!(outcomes[1].as_ref().unwrap_err().code(), "store_write");
        assert_eq!(store.count().await.unwrap(), 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_empty_store_search_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::connect(&test_store_config(&dir)).await.unwrap();
        let hits = store.similarity_search(&[1.0, 0.0], 5).await.unwrap();
        assert!(hits.is_empty());
        store.close().await;
    }
}
