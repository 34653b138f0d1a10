//! Cache backend trait and statistics.
//!
//! A backend stores summaries under encoded keys and can list the keys that
//! share a prefix. That listing is the only enumeration the invalidation
//! path needs, so no separate key registry is kept next to the store.

use std::time::Duration;

use async_trait::async_trait;
use ecl_core::{EclResult, ThresholdSummary};

/// Cache backend trait for pluggable summary stores.
///
/// Implementations must be thread-safe. Entries expire `ttl` after they are
/// written; an expired entry behaves exactly like an absent one.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a summary by encoded key, or None if absent or expired.
    async fn get(&self, key: &str) -> EclResult<Option<ThresholdSummary>>;

    /// Store a summary under an encoded key, replacing any previous value.
    async fn put(&self, key: &str, summary: &ThresholdSummary, ttl: Duration) -> EclResult<()>;

    /// Remove a key.
    ///
    /// Returns whether a live entry was removed. Removing an absent or
    /// expired key is not an error.
    async fn remove(&self, key: &str) -> EclResult<bool>;

    /// List stored keys starting with `prefix`.
    ///
    /// Entries that expired but were not yet reclaimed may be included.
    async fn keys_with_prefix(&self, prefix: &str) -> EclResult<Vec<String>>;

    /// Delete every expired entry. Returns how many were removed.
    async fn purge_expired(&self) -> EclResult<usize>;

    /// Get cache statistics.
    async fn stats(&self) -> EclResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (absent or expired).
    pub misses: u64,
    /// Number of entries currently held, including ones not yet reclaimed.
    pub entry_count: u64,
    /// Approximate size of stored values in bytes.
    pub memory_bytes: u64,
    /// Number of entries dropped because they expired.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
