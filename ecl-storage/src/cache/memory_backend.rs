//! In-process cache backend.
//!
//! Entries live in a [`DashMap`] keyed by the encoded summary key, each with
//! its own expiry instant. Expired entries are dropped when read, or in bulk
//! by [`CacheBackend::purge_expired`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use ecl_core::{EclResult, ThresholdSummary};

use super::traits::{CacheBackend, CacheStats};

#[derive(Debug, Clone, Copy)]
struct Entry {
    summary: ThresholdSummary,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// DashMap-backed summary store with per-entry TTL.
#[derive(Debug, Default)]
pub struct InMemoryCacheBackend {
    entries: DashMap<String, Entry>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &str) -> EclResult<Option<ThresholdSummary>> {
        let now = Instant::now();
        let found = self.entries.get(key).map(|e| *e);

        match found {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.summary))
            }
            Some(_) => {
                // Only drop the entry if nobody replaced it in the meantime.
                if self
                    .entries
                    .remove_if(key, |_, entry| entry.is_expired(now))
                    .is_some()
                {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &str, summary: &ThresholdSummary, ttl: Duration) -> EclResult<()> {
        let entry = Entry {
            summary: *summary,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> EclResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now)))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> EclResult<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect())
    }

    async fn purge_expired(&self) -> EclResult<usize> {
        let now = Instant::now();
        let mut purged = 0;
        self.entries.retain(|_, entry| {
            let expired = entry.is_expired(now);
            purged += usize::from(expired);
            !expired
        });
        self.evictions.fetch_add(purged as u64, Ordering::Relaxed);
        Ok(purged)
    }

    async fn stats(&self) -> EclResult<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
            memory_bytes: (self.entries.len() * std::mem::size_of::<Entry>()) as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}
