//! SQLite-backed cache for merged API responses.
//!
//! Maps a request signature (endpoint + canonically sorted parameters) to
//! the serialized merged item array. One record per signature; a new fetch
//! replaces the prior record in place. Records live until an explicit
//! `sweep` removes those older than a caller-supplied threshold.

use crate::config::StorageConfig;
use crate::{ReconError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Compute the stable signature of an (endpoint, parameter-set) request.
///
/// Parameters are sorted by key and JSON-serialized before hashing, so two
/// calls with the same parameter set collide to the same signature
/// regardless of insertion order, across process restarts.
pub fn request_signature(endpoint: &str, params: &[(String, String)]) -> String {
    let mut sorted = params.to_vec();
    sorted.sort();

    let mut map = serde_json::Map::new();
    for (key, value) in sorted {
        map.insert(key, Value::String(value));
    }
    let canonical = Value::Object(map).to_string();

    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_bytes());
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Signature-keyed response cache.
///
/// Thread-safe via an internal mutex on the connection; WAL mode keeps
/// concurrent readers and writers across connections safe.
pub struct ResponseCache {
    conn: Arc<Mutex<Connection>>,
}

impl ResponseCache {
    /// Open the cache at the given database path.
    ///
    /// Creates the database, parent directories, and tables if they don't
    /// exist.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ReconError::io_with_path(e, parent))?;
        }

        let conn = Connection::open(db_path).map_err(|e| ReconError::Database {
            message: format!("Failed to open cache database: {}", e),
            source: Some(e),
        })?;

        conn.execute_batch(&format!(
            "PRAGMA journal_mode=WAL;\n\
             PRAGMA busy_timeout={};\n\
             PRAGMA synchronous=NORMAL;",
            StorageConfig::BUSY_TIMEOUT_MS,
        ))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS api_cache (
                signature TEXT PRIMARY KEY,
                endpoint TEXT NOT NULL,
                params_json TEXT NOT NULL,
                response_json TEXT NOT NULL,
                cached_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cache_age
                ON api_cache(cached_at);
            "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ReconError::Database {
            message: "Failed to acquire cache connection lock".to_string(),
            source: None,
        })
    }

    /// Look up the cached payload for a request, missing when no record
    /// exists or the record is older than `max_age_hours`.
    ///
    /// A record whose stored JSON no longer parses is surfaced as
    /// [`ReconError::Corrupt`], never repaired or silently dropped.
    pub fn get(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        max_age_hours: u64,
    ) -> Result<Option<Value>> {
        let signature = request_signature(endpoint, params);
        let cutoff = (Utc::now() - chrono::Duration::hours(max_age_hours as i64)).to_rfc3339();

        let conn = self.lock_conn()?;
        let row: Option<String> = conn
            .query_row(
                "SELECT response_json FROM api_cache
                 WHERE signature = ?1 AND cached_at > ?2",
                params![signature, cutoff],
                |row| row.get(0),
            )
            .optional()?;

        let Some(response_json) = row else {
            return Ok(None);
        };

        let payload: Value =
            serde_json::from_str(&response_json).map_err(|e| ReconError::Corrupt {
                what: format!("cache record {}", signature),
                detail: e.to_string(),
            })?;

        debug!(endpoint, signature = %signature, "Cache hit");
        Ok(Some(payload))
    }

    /// Store the payload for a request, overwriting any existing record
    /// with the same signature.
    pub fn put(&self, endpoint: &str, params: &[(String, String)], payload: &Value) -> Result<()> {
        let signature = request_signature(endpoint, params);
        let params_json = serde_json::to_string(params)?;
        let response_json = serde_json::to_string(payload)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO api_cache
             (signature, endpoint, params_json, response_json, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![signature, endpoint, params_json, response_json, now],
        )?;

        debug!(endpoint, signature = %signature, "Cached response");
        Ok(())
    }

    /// Delete records older than `max_age_days`. Returns the number of
    /// records removed. Caller-invoked; no background scheduling exists.
    pub fn sweep(&self, max_age_days: u64) -> Result<usize> {
        let cutoff = (Utc::now() - chrono::Duration::days(max_age_days as i64)).to_rfc3339();

        let conn = self.lock_conn()?;
        let removed = conn.execute(
            "DELETE FROM api_cache WHERE cached_at < ?1",
            params![cutoff],
        )?;

        if removed > 0 {
            debug!(removed, "Swept expired cache records");
        }
        Ok(removed)
    }
}
