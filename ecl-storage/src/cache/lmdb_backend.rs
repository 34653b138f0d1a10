//! LMDB-backed cache backend.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep summaries in a
//! memory-mapped store that survives process restarts.
//!
//! # Value Layout
//!
//! ```text
//! [expires_at: i64 millis, little endian][summary as JSON]
//! ```
//!
//! Expiry is wall-clock based so it stays meaningful across restarts. Expired
//! entries are deleted when they are read or removed, and in bulk by
//! [`CacheBackend::purge_expired`].
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. Reads use read transactions; `put`,
//! `remove` and lazy expiry use write transactions. Counters are atomics.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ecl_core::{CacheError, EclError, EclResult, ThresholdSummary};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::traits::{CacheBackend, CacheStats};

const HEADER_LEN: usize = 8;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// The memory map is full.
    #[error("LMDB map is full")]
    MapFull,

    /// Serialization error.
    #[error("Serialization error for {key}: {reason}")]
    Serialization { key: String, reason: String },

    /// Deserialization error.
    #[error("Deserialization error for {key}: {reason}")]
    Deserialization { key: String, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<heed::Error> for LmdbCacheError {
    fn from(e: heed::Error) -> Self {
        match e {
            heed::Error::Mdb(heed::MdbError::MapFull) => Self::MapFull,
            other => Self::Transaction(other.to_string()),
        }
    }
}

/// Convert LmdbCacheError to EclError.
impl From<LmdbCacheError> for EclError {
    fn from(e: LmdbCacheError) -> Self {
        let cache_error = match e {
            LmdbCacheError::EnvOpen(reason) | LmdbCacheError::DbOpen(reason) => {
                CacheError::Unavailable { reason }
            }
            LmdbCacheError::Io(io) => CacheError::Unavailable {
                reason: io.to_string(),
            },
            LmdbCacheError::Transaction(reason) => CacheError::TransactionFailed { reason },
            LmdbCacheError::MapFull => CacheError::Full,
            LmdbCacheError::Serialization { key, reason } => CacheError::Encode { key, reason },
            LmdbCacheError::Deserialization { key, reason } => CacheError::Decode { key, reason },
        };
        EclError::Cache(cache_error)
    }
}

/// LMDB-backed summary store.
///
/// # Example
///
/// ```ignore
/// use ecl_storage::cache::LmdbCacheBackend;
///
/// let backend = LmdbCacheBackend::new("/var/lib/ecl/cache", 64)?;
/// backend.put(&key, &summary, Duration::from_secs(900)).await?;
/// let cached = backend.get(&key).await?;
/// ```
pub struct LmdbCacheBackend {
    env: Env,
    db: Database<Bytes, Bytes>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl LmdbCacheBackend {
    /// Create a new LMDB cache backend.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the LMDB
    /// environment or database cannot be opened.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per backend and the
        // directory is not shared with another process in this crate.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn()?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            db,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    fn encode_value(
        key: &str,
        summary: &ThresholdSummary,
        expires_at_millis: i64,
    ) -> Result<Vec<u8>, LmdbCacheError> {
        let json = serde_json::to_vec(summary).map_err(|e| LmdbCacheError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + json.len());
        bytes.extend_from_slice(&expires_at_millis.to_le_bytes());
        bytes.extend_from_slice(&json);
        Ok(bytes)
    }

    fn expires_at(key: &str, bytes: &[u8]) -> Result<i64, LmdbCacheError> {
        let header: [u8; HEADER_LEN] = bytes
            .get(..HEADER_LEN)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| LmdbCacheError::Deserialization {
                key: key.to_string(),
                reason: "value shorter than expiry header".to_string(),
            })?;
        Ok(i64::from_le_bytes(header))
    }

    fn decode_value(key: &str, bytes: &[u8]) -> Result<ThresholdSummary, LmdbCacheError> {
        serde_json::from_slice(&bytes[HEADER_LEN..]).map_err(|e| {
            LmdbCacheError::Deserialization {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Look up a key and classify it as live, expired or absent.
    fn read_live(&self, key: &str, now_millis: i64) -> Result<Lookup, LmdbCacheError> {
        let rtxn = self.env.read_txn()?;
        let Some(bytes) = self.db.get(&rtxn, key.as_bytes())? else {
            return Ok(Lookup::Absent);
        };
        if Self::expires_at(key, bytes)? <= now_millis {
            return Ok(Lookup::Expired);
        }
        Ok(Lookup::Live(Self::decode_value(key, bytes)?))
    }

    /// Keys whose entry expired at `now_millis`, in key order.
    fn expired_keys(&self, now_millis: i64) -> Result<Vec<String>, LmdbCacheError> {
        let rtxn = self.env.read_txn()?;
        let mut expired = Vec::new();
        for result in self.db.iter(&rtxn)? {
            let (key, bytes) = result?;
            let Ok(key) = std::str::from_utf8(key) else {
                continue;
            };
            if Self::expires_at(key, bytes)? <= now_millis {
                expired.push(key.to_string());
            }
        }
        Ok(expired)
    }

    /// Delete, in one write transaction, each key still expired at `now_millis`.
    fn delete_all_expired(
        &self,
        keys: &[String],
        now_millis: i64,
    ) -> Result<usize, LmdbCacheError> {
        let mut wtxn = self.env.write_txn()?;
        let mut deleted = 0;
        for key in keys {
            // A key rewritten since the scan is live again.
            let still_expired = match self.db.get(&wtxn, key.as_bytes())? {
                Some(bytes) => Self::expires_at(key, bytes)? <= now_millis,
                None => false,
            };
            if still_expired && self.db.delete(&mut wtxn, key.as_bytes())? {
                deleted += 1;
            }
        }
        wtxn.commit()?;
        self.evictions.fetch_add(deleted as u64, Ordering::Relaxed);
        Ok(deleted)
    }

    /// Delete a key if it is still expired at `now_millis`.
    fn delete_if_expired(&self, key: &str, now_millis: i64) -> Result<bool, LmdbCacheError> {
        let mut wtxn = self.env.write_txn()?;
        let expired = match self.db.get(&wtxn, key.as_bytes())? {
            Some(bytes) => Self::expires_at(key, bytes)? <= now_millis,
            None => false,
        };
        if expired {
            self.db.delete(&mut wtxn, key.as_bytes())?;
        }
        wtxn.commit()?;
        if expired {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(expired)
    }
}

enum Lookup {
    Absent,
    Expired,
    Live(ThresholdSummary),
}

#[async_trait]
impl CacheBackend for LmdbCacheBackend {
    async fn get(&self, key: &str) -> EclResult<Option<ThresholdSummary>> {
        let now = Utc::now().timestamp_millis();
        match self.read_live(key, now) {
            Ok(Lookup::Live(summary)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(summary))
            }
            Ok(Lookup::Expired) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.delete_if_expired(key, now)?;
                Ok(None)
            }
            Ok(Lookup::Absent) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    async fn put(&self, key: &str, summary: &ThresholdSummary, ttl: Duration) -> EclResult<()> {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_millis);
        let bytes = Self::encode_value(key, summary, expires_at)?;

        let mut wtxn = self.env.write_txn().map_err(LmdbCacheError::from)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &bytes)
            .map_err(LmdbCacheError::from)?;
        wtxn.commit().map_err(LmdbCacheError::from)?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> EclResult<bool> {
        let now = Utc::now().timestamp_millis();
        let mut wtxn = self.env.write_txn().map_err(LmdbCacheError::from)?;

        let live = match self
            .db
            .get(&wtxn, key.as_bytes())
            .map_err(LmdbCacheError::from)?
        {
            // An undecodable header still gets deleted; it just isn't "live".
            Some(bytes) => Self::expires_at(key, bytes).map_or(false, |exp| exp > now),
            None => false,
        };
        let deleted = self
            .db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(LmdbCacheError::from)?;
        wtxn.commit().map_err(LmdbCacheError::from)?;

        if deleted && !live {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(deleted && live)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> EclResult<Vec<String>> {
        let rtxn = self.env.read_txn().map_err(LmdbCacheError::from)?;
        let iter = self
            .db
            .prefix_iter(&rtxn, prefix.as_bytes())
            .map_err(LmdbCacheError::from)?;

        let mut keys = Vec::new();
        for result in iter {
            let (key, _) = result.map_err(LmdbCacheError::from)?;
            // Keys are always written from &str, so this only skips foreign data.
            if let Ok(key) = std::str::from_utf8(key) {
                keys.push(key.to_string());
            }
        }
        Ok(keys)
    }

    async fn purge_expired(&self) -> EclResult<usize> {
        let now = Utc::now().timestamp_millis();
        let candidates = self.expired_keys(now)?;
        if candidates.is_empty() {
            return Ok(0);
        }
        Ok(self.delete_all_expired(&candidates, now)?)
    }

    async fn stats(&self) -> EclResult<CacheStats> {
        let rtxn = self.env.read_txn().map_err(LmdbCacheError::from)?;
        let entry_count = self.db.len(&rtxn).map_err(LmdbCacheError::from)?;
        let disk_size = self.env.real_disk_size().map_err(LmdbCacheError::from)?;

        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            memory_bytes: disk_size,
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}
