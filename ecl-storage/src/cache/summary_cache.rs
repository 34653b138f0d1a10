//! Summary cache: TTL storage plus pattern invalidation over one backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ecl_core::{EclResult, ThresholdSummary};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::key::{namespace_prefix, InvalidationPattern, SummaryCacheKey};
use super::matcher::matches_pattern;
use super::traits::{CacheBackend, CacheStats};

/// Result of one invalidation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidationOutcome {
    /// Keys selected by the pattern(s).
    pub matched: usize,
    /// Live entries actually removed. Expired or already-absent keys count
    /// as matched but not evicted.
    pub evicted: usize,
    /// Keys whose removal failed and which therefore are still stored.
    pub retained: usize,
}

impl InvalidationOutcome {
    fn merge(&mut self, other: InvalidationOutcome) {
        self.matched += other.matched;
        self.evicted += other.evicted;
        self.retained += other.retained;
    }

    /// Returns true if every matched key is gone from the store.
    pub fn is_complete(&self) -> bool {
        self.retained == 0
    }
}

/// Threshold summary cache owned by the component that uses it.
///
/// `set` and every invalidation path run under one internal write lock, so a
/// summary cannot be stored in the middle of an invalidation pass and
/// silently survive it. `try_get` does not take the lock; a read racing an
/// invalidation sees either the old entry or a miss.
///
/// Every distinct threshold gets its own key, so `set` also sweeps expired
/// entries out of the backend, at most once per TTL.
pub struct SummaryCache<B: CacheBackend> {
    backend: Arc<B>,
    /// Guards writes; holds the time of the last expiry sweep.
    write_lock: Mutex<Instant>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<B: CacheBackend> SummaryCache<B> {
    pub fn new(backend: Arc<B>, ttl: Duration) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(Instant::now()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a reference to the cache backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a cached summary.
    pub async fn try_get(&self, key: &SummaryCacheKey) -> EclResult<Option<ThresholdSummary>> {
        let cached = self.backend.get(&key.encode()).await?;
        if cached.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(cached)
    }

    /// Store a summary with the configured TTL, replacing any previous value.
    ///
    /// Expired entries are swept first once a TTL has passed since the last
    /// sweep. A failed sweep is logged and does not block the write.
    pub async fn set(&self, key: &SummaryCacheKey, summary: &ThresholdSummary) -> EclResult<()> {
        let mut last_sweep = self.write_lock.lock().await;
        if last_sweep.elapsed() >= self.ttl {
            match self.backend.purge_expired().await {
                Ok(purged) => {
                    if purged > 0 {
                        debug!(purged, "Swept expired threshold summaries");
                    }
                    *last_sweep = Instant::now();
                }
                Err(e) => warn!(error = %e, "Failed to sweep expired threshold summaries"),
            }
        }
        self.backend.put(&key.encode(), summary, self.ttl).await
    }

    /// Delete every expired entry from the backend now.
    pub async fn purge_expired(&self) -> EclResult<usize> {
        let mut last_sweep = self.write_lock.lock().await;
        let purged = self.backend.purge_expired().await?;
        *last_sweep = Instant::now();
        Ok(purged)
    }

    /// Evict every threshold summary.
    pub async fn invalidate_all(&self) -> EclResult<InvalidationOutcome> {
        let _guard = self.write_lock.lock().await;
        let keys = self.backend.keys_with_prefix(&namespace_prefix()).await?;
        let outcome = self.evict(keys).await;
        debug!(
            matched = outcome.matched,
            evicted = outcome.evicted,
            "Invalidated all threshold summaries"
        );
        Ok(outcome)
    }

    /// Evict every summary selected by `pattern`, for all thresholds.
    pub async fn invalidate_by_pattern(
        &self,
        pattern: &InvalidationPattern,
    ) -> EclResult<InvalidationOutcome> {
        self.invalidate_by_patterns(std::slice::from_ref(pattern))
            .await
    }

    /// Evict every summary selected by any of `patterns` in one locked pass.
    pub async fn invalidate_by_patterns(
        &self,
        patterns: &[InvalidationPattern],
    ) -> EclResult<InvalidationOutcome> {
        let _guard = self.write_lock.lock().await;

        let mut outcome = InvalidationOutcome::default();
        for pattern in patterns {
            let encoded = pattern.encode();
            let candidates = self.backend.keys_with_prefix(&pattern.scan_prefix()).await?;
            let matched: Vec<String> = candidates
                .into_iter()
                .filter(|k| matches_pattern(k, &encoded))
                .collect();

            let pass = self.evict(matched).await;
            debug!(
                pattern = %encoded,
                matched = pass.matched,
                evicted = pass.evicted,
                "Invalidated threshold summaries by pattern"
            );
            outcome.merge(pass);
        }
        Ok(outcome)
    }

    /// Remove keys from the store. Must be called with the write lock held.
    async fn evict(&self, keys: Vec<String>) -> InvalidationOutcome {
        let mut outcome = InvalidationOutcome {
            matched: keys.len(),
            ..Default::default()
        };

        for key in keys {
            match self.backend.remove(&key).await {
                Ok(true) => outcome.evicted += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to evict cached summary");
                    outcome.retained += 1;
                }
            }
        }
        outcome
    }

    /// Keys currently held by the store, sorted.
    pub async fn registered_keys(&self) -> EclResult<Vec<String>> {
        let mut keys = self.backend.keys_with_prefix(&namespace_prefix()).await?;
        keys.sort();
        Ok(keys)
    }

    /// Number of keys currently held by the store.
    pub async fn len(&self) -> EclResult<usize> {
        Ok(self.backend.keys_with_prefix(&namespace_prefix()).await?.len())
    }

    pub async fn is_empty(&self) -> EclResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Hit and miss counts seen by this cache, plus the backend's view.
    pub async fn stats(&self) -> EclResult<CacheStats> {
        let backend = self.backend.stats().await?;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ..backend
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory_backend::InMemoryCacheBackend;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use ecl_core::{
        classify, AsOfDate, CacheError, CurrencyCode, CustomerExposureTotal, Decimal, EclError,
    };
    use uuid::Uuid;

    const TTL: Duration = Duration::from_secs(900);

    fn date() -> AsOfDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    fn usd() -> CurrencyCode {
        CurrencyCode::new("USD").unwrap()
    }

    fn summary() -> ThresholdSummary {
        classify(
            &[CustomerExposureTotal::new("C1", Decimal::from(150))],
            Decimal::from(100),
        )
    }

    fn key(branch: Uuid, threshold: i64) -> SummaryCacheKey {
        SummaryCacheKey::new(Some(date()), Some(branch), Some(usd()), Decimal::from(threshold))
    }

    fn memory_cache() -> SummaryCache<InMemoryCacheBackend> {
        SummaryCache::new(Arc::new(InMemoryCacheBackend::new()), TTL)
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = memory_cache();
        let k = key(Uuid::now_v7(), 100);

        assert!(cache.try_get(&k).await.unwrap().is_none());
        cache.set(&k, &summary()).await.unwrap();
        assert_eq!(cache.try_get(&k).await.unwrap(), Some(summary()));
        assert_eq!(cache.registered_keys().await.unwrap(), vec![k.encode()]);

        let stats = cache.stats().await.unwrap();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[tokio::test]
    async fn test_pattern_evicts_every_threshold() {
        let cache = memory_cache();
        let branch = Uuid::now_v7();
        let other = Uuid::now_v7();

        cache.set(&key(branch, 100), &summary()).await.unwrap();
        cache.set(&key(branch, 200), &summary()).await.unwrap();
        cache.set(&key(other, 100), &summary()).await.unwrap();

        let pattern = InvalidationPattern::new(Some(branch), Some(date()), Some(&usd()));
        let outcome = cache.invalidate_by_pattern(&pattern).await.unwrap();

        assert_eq!(
            outcome,
            InvalidationOutcome {
                matched: 2,
                evicted: 2,
                retained: 0
            }
        );
        assert!(cache.try_get(&key(branch, 100)).await.unwrap().is_none());
        assert!(cache.try_get(&key(branch, 200)).await.unwrap().is_none());
        assert!(cache.try_get(&key(other, 100)).await.unwrap().is_some());
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_branch_wildcard_pattern_scans_namespace() {
        let cache = memory_cache();
        let branch = Uuid::now_v7();

        cache.set(&key(branch, 100), &summary()).await.unwrap();
        let latest = SummaryCacheKey::new(None, Some(branch), None, Decimal::from(5));
        cache.set(&latest, &summary()).await.unwrap();

        let outcome = cache
            .invalidate_by_pattern(&InvalidationPattern::new(Some(branch), None, None))
            .await
            .unwrap();
        assert_eq!(outcome.evicted, 2);
        assert!(cache.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache = memory_cache();
        for threshold in [1, 2, 3] {
            cache.set(&key(Uuid::now_v7(), threshold), &summary()).await.unwrap();
        }

        let outcome = cache.invalidate_all().await.unwrap();
        assert_eq!(outcome.matched, 3);
        assert_eq!(outcome.evicted, 3);
        assert!(cache.registered_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_all_on_empty_cache() {
        let cache = memory_cache();
        let outcome = cache.invalidate_all().await.unwrap();
        assert_eq!(outcome, InvalidationOutcome::default());
    }

    #[tokio::test]
    async fn test_expired_entry_eviction_is_noop() {
        let cache = SummaryCache::new(Arc::new(InMemoryCacheBackend::new()), Duration::ZERO);
        let k = key(Uuid::now_v7(), 100);
        cache.set(&k, &summary()).await.unwrap();

        let outcome = cache.invalidate_all().await.unwrap();
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.evicted, 0);
        assert!(outcome.is_complete());
        assert!(cache.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_by_patterns_merges_outcomes() {
        let cache = memory_cache();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        cache.set(&key(a, 1), &summary()).await.unwrap();
        cache.set(&key(b, 1), &summary()).await.unwrap();

        let patterns = [
            InvalidationPattern::new(Some(a), None, None),
            InvalidationPattern::new(Some(b), None, None),
        ];
        let outcome = cache.invalidate_by_patterns(&patterns).await.unwrap();
        assert_eq!(outcome.evicted, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_set_and_invalidate() {
        let cache = Arc::new(memory_cache());
        let branch = Uuid::now_v7();
        let pattern = InvalidationPattern::new(Some(branch), None, None);

        for round in 0..8 {
            // Every set completes before the invalidation that covers it starts.
            let mut writers = Vec::new();
            for i in 0..32 {
                let cache = Arc::clone(&cache);
                writers.push(tokio::spawn(async move {
                    cache
                        .set(&key(branch, round * 100 + i + 1), &summary())
                        .await
                        .unwrap();
                }));
            }
            for writer in writers {
                writer.await.unwrap();
            }
            assert_eq!(cache.len().await.unwrap(), 32);

            // Concurrent invalidations of the same scope: every key is
            // evicted exactly once between them.
            let mut invalidators = Vec::new();
            for _ in 0..4 {
                let cache = Arc::clone(&cache);
                let pattern = pattern.clone();
                invalidators.push(tokio::spawn(async move {
                    cache.invalidate_by_pattern(&pattern).await.unwrap()
                }));
            }
            let mut evicted = 0;
            for invalidator in invalidators {
                evicted += invalidator.await.unwrap().evicted;
            }

            assert_eq!(evicted, 32);
            assert_eq!(cache.len().await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_set_sweeps_expired_entries() {
        let cache = SummaryCache::new(
            Arc::new(InMemoryCacheBackend::new()),
            Duration::from_millis(1),
        );
        let branch = Uuid::now_v7();
        for threshold in 1..=1000 {
            cache.set(&key(branch, threshold), &summary()).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.set(&key(branch, 1001), &summary()).await.unwrap();

        assert_eq!(cache.backend().len(), 1);
        assert!(cache.stats().await.unwrap().evictions >= 1000);
    }

    #[tokio::test]
    async fn test_set_skips_sweep_within_ttl() {
        let cache = memory_cache();
        cache
            .backend()
            .put("ecl_threshold_summary:stale", &summary(), Duration::ZERO)
            .await
            .unwrap();

        cache.set(&key(Uuid::now_v7(), 1), &summary()).await.unwrap();
        assert_eq!(cache.backend().len(), 2);

        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.backend().len(), 1);
    }

    /// Backend whose removals always fail.
    #[derive(Default)]
    struct StuckBackend {
        inner: InMemoryCacheBackend,
    }

    #[async_trait]
    impl CacheBackend for StuckBackend {
        async fn get(&self, key: &str) -> EclResult<Option<ThresholdSummary>> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, summary: &ThresholdSummary, ttl: Duration) -> EclResult<()> {
            self.inner.put(key, summary, ttl).await
        }

        async fn remove(&self, _key: &str) -> EclResult<bool> {
            Err(EclError::Cache(CacheError::TransactionFailed {
                reason: "stuck".to_string(),
            }))
        }

        async fn keys_with_prefix(&self, prefix: &str) -> EclResult<Vec<String>> {
            self.inner.keys_with_prefix(prefix).await
        }

        async fn purge_expired(&self) -> EclResult<usize> {
            self.inner.purge_expired().await
        }

        async fn stats(&self) -> EclResult<CacheStats> {
            self.inner.stats().await
        }
    }

    #[tokio::test]
    async fn test_failed_removal_is_retained() {
        let cache = SummaryCache::new(Arc::new(StuckBackend::default()), TTL);
        let k = key(Uuid::now_v7(), 100);
        cache.set(&k, &summary()).await.unwrap();

        let outcome = cache.invalidate_all().await.unwrap();
        assert_eq!(outcome.retained, 1);
        assert!(!outcome.is_complete());
        assert_eq!(cache.registered_keys().await.unwrap(), vec![k.encode()]);
    }
}
