//! Durable keyed memory with embedding-based similarity search.
//!
//! A single SQLite table holds key/value pairs and optional embedding
//! vectors serialized as little-endian f32 blobs. Search is a full scan
//! computing cosine similarity against every stored embedding of matching
//! dimension. That is linear in rows, fine up to ~10^5 entries at typical
//! embedding sizes; an index is explicitly out of scope.
//!
//! Failure surface follows the runtime's storage policy: errors are logged
//! and operations return `false`/`None`/empty rather than propagating.

pub mod vector;

use cclaw_core::MemoryError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, error, info};

pub use vector::{cosine_similarity, decode_embedding, encode_embedding};

/// One search hit: key, stored value, cosine score.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub key: String,
    pub value: String,
    pub score: f32,
}

pub struct MemoryStore {
    pool: SqlitePool,
}

impl MemoryStore {
    /// Open (or create) the backing database and ensure the table exists.
    /// Pass `":memory:"` for an ephemeral store.
    ///
    /// A single pooled connection serializes all access; the store has no
    /// cross-connection consistency requirements beyond that.
    pub async fn open(path: &str) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("invalid database path {path}: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("failed to open {path}: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                embedding  BLOB,
                embed_dim  INTEGER DEFAULT 0,
                created_at INTEGER DEFAULT (strftime('%s','now')),
                updated_at INTEGER DEFAULT (strftime('%s','now'))
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("failed to create memory table: {e}")))?;

        info!(path, "memory store opened");
        Ok(Self { pool })
    }

    /// Upsert a key. Replaces the value and embedding atomically and bumps
    /// `updated_at`. Returns `false` on storage failure.
    pub async fn store(&self, key: &str, value: &str, embedding: Option<&[f32]>) -> bool {
        let (blob, dim) = match embedding {
            Some(v) if !v.is_empty() => (Some(encode_embedding(v)), v.len() as i64),
            _ => (None, 0),
        };

        let result = sqlx::query(
            "INSERT OR REPLACE INTO memory (key, value, embedding, embed_dim, updated_at) \
             VALUES (?, ?, ?, ?, strftime('%s','now'))",
        )
        .bind(key)
        .bind(value)
        .bind(blob)
        .bind(dim)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                error!(key, "memory store failed: {e}");
                false
            }
        }
    }

    /// Exact-key lookup.
    pub async fn get(&self, key: &str) -> Option<String> {
        let row = sqlx::query("SELECT value FROM memory WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await;

        match row {
            Ok(row) => row.map(|r| r.get::<String, _>(0)),
            Err(e) => {
                error!(key, "memory get failed: {e}");
                None
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        match sqlx::query("DELETE FROM memory WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!(key, "memory delete failed: {e}");
                false
            }
        }
    }

    /// Top-k rows by cosine similarity to `query`. Rows whose stored
    /// dimension or blob length disagree with the query are skipped. Ties
    /// keep first-seen order (the sort is stable).
    pub async fn search(&self, query: &[f32], top_k: usize) -> Vec<SearchHit> {
        let rows = sqlx::query(
            "SELECT key, value, embedding, embed_dim FROM memory WHERE embedding IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await;

        let rows: Vec<SqliteRow> = match rows {
            Ok(rows) => rows,
            Err(e) => {
                error!("memory search failed: {e}");
                return Vec::new();
            }
        };

        let dim = query.len() as i64;
        let mut hits: Vec<SearchHit> = rows
            .iter()
            .filter_map(|row| {
                if row.get::<i64, _>(3) != dim {
                    return None;
                }
                let blob: Vec<u8> = row.get(2);
                if blob.len() != query.len() * 4 {
                    return None;
                }
                let stored = decode_embedding(&blob)?;
                Some(SearchHit {
                    key: row.get(0),
                    value: row.get(1),
                    score: cosine_similarity(query, &stored),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        debug!(hits = hits.len(), "memory search");
        hits
    }
}
