//! Read-through threshold summary service.
//!
//! Routes summary reads through the [`SummaryCache`] and falls back to the
//! [`ExposureAggregator`] on a miss. Cache failures are logged and never fail
//! a read: the summary is recomputed instead. Exposure writes go through the
//! same service so every change is followed by the matching invalidation.

use std::collections::BTreeSet;
use std::sync::Arc;

use ecl_core::{
    AsOfDate, BranchId, CurrencyCode, EclConfig, EclResult, ExposureRecord, SnapshotScope,
    ThresholdSummary, ThresholdSummaryQuery,
};
use tracing::{debug, warn};

use crate::aggregator::ExposureAggregator;
use crate::cache::{
    CacheBackend, InvalidationOutcome, InvalidationPattern, SummaryCache, SummaryCacheKey,
};
use crate::exposure::ExposureStore;

/// Result of a summary read, carrying whether it came from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryRead {
    summary: ThresholdSummary,
    was_cache_hit: bool,
}

impl SummaryRead {
    /// Create a read served from the cache.
    pub fn from_cache(summary: ThresholdSummary) -> Self {
        Self {
            summary,
            was_cache_hit: true,
        }
    }

    /// Create a read computed from the exposure store.
    pub fn computed(summary: ThresholdSummary) -> Self {
        Self {
            summary,
            was_cache_hit: false,
        }
    }

    /// Consume the wrapper and return the summary.
    pub fn into_summary(self) -> ThresholdSummary {
        self.summary
    }

    pub fn summary(&self) -> &ThresholdSummary {
        &self.summary
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }
}

/// Rows written by an exposure change and the invalidation that followed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExposureChange {
    pub rows: u64,
    pub invalidation: InvalidationOutcome,
}

/// Threshold summaries with read-through caching.
///
/// # Type Parameters
///
/// - `S`: the exposure store the aggregator reads from
/// - `B`: the cache backend behind the summary cache
///
/// # Example
///
/// ```ignore
/// let service = ThresholdSummaryService::from_config(store, backend, &EclConfig::default());
///
/// let read = service.summarize(&query).await?;
/// if read.was_cache_hit() { /* ... */ }
///
/// // After exposure rows of a branch change
/// service.invalidate_for(Some(branch_id), None, None).await?;
/// ```
pub struct ThresholdSummaryService<S, B>
where
    S: ExposureStore,
    B: CacheBackend,
{
    aggregator: ExposureAggregator<S>,
    cache: Arc<SummaryCache<B>>,
    cache_enabled: bool,
}

impl<S, B> ThresholdSummaryService<S, B>
where
    S: ExposureStore,
    B: CacheBackend,
{
    /// Create a service around an existing aggregator and cache.
    pub fn new(aggregator: ExposureAggregator<S>, cache: Arc<SummaryCache<B>>) -> Self {
        Self {
            aggregator,
            cache,
            cache_enabled: true,
        }
    }

    /// Create a service whose cache uses the configured TTL.
    pub fn from_config(store: Arc<S>, backend: Arc<B>, config: &EclConfig) -> Self {
        Self {
            aggregator: ExposureAggregator::new(store),
            cache: Arc::new(SummaryCache::new(backend, config.cache_ttl)),
            cache_enabled: config.cache_enabled,
        }
    }

    pub fn aggregator(&self) -> &ExposureAggregator<S> {
        &self.aggregator
    }

    pub fn cache(&self) -> &SummaryCache<B> {
        &self.cache
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Get the summary for a query, from the cache when possible.
    ///
    /// The cache key uses the date as requested, so a request without a date
    /// is cached under `latest` rather than under the date it resolved to.
    pub async fn summarize(&self, query: &ThresholdSummaryQuery) -> EclResult<SummaryRead> {
        if !self.cache_enabled {
            return Ok(SummaryRead::computed(self.aggregator.summarize(query).await?));
        }

        let key = SummaryCacheKey::from_query(query);
        match self.cache.try_get(&key).await {
            Ok(Some(summary)) => {
                debug!(key = %key, "Threshold summary cache hit");
                return Ok(SummaryRead::from_cache(summary));
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Summary cache read failed, recomputing"),
        }

        let summary = self.aggregator.summarize(query).await?;

        if let Err(e) = self.cache.set(&key, &summary).await {
            warn!(key = %key, error = %e, "Failed to cache threshold summary");
        }
        Ok(SummaryRead::computed(summary))
    }

    /// Evict every cached summary.
    pub async fn invalidate_all(&self) -> EclResult<InvalidationOutcome> {
        self.cache.invalidate_all().await
    }

    /// Evict every summary that can include rows of the given filters.
    ///
    /// Besides keys carrying the literal values, keys cached under the
    /// `latest` date or the `all` branch/currency sentinels are evicted too,
    /// since those aggregates cover the changed rows.
    pub async fn invalidate_for(
        &self,
        branch_id: Option<BranchId>,
        as_of_date: Option<AsOfDate>,
        currency: Option<&CurrencyCode>,
    ) -> EclResult<InvalidationOutcome> {
        let patterns = InvalidationPattern::covering(branch_id, as_of_date, currency);
        self.cache.invalidate_by_patterns(&patterns).await
    }

    /// Evict every summary affected by changes to the given snapshots.
    pub async fn invalidate_snapshots(
        &self,
        scopes: &[SnapshotScope],
    ) -> EclResult<InvalidationOutcome> {
        let mut seen = BTreeSet::new();
        let mut patterns = Vec::new();
        for scope in scopes.iter().filter(|s| seen.insert(*s)) {
            for pattern in InvalidationPattern::covering(
                Some(scope.branch_id),
                Some(scope.as_of_date),
                scope.currency.as_ref(),
            ) {
                if !patterns.contains(&pattern) {
                    patterns.push(pattern);
                }
            }
        }
        self.cache.invalidate_by_patterns(&patterns).await
    }

    /// Insert exposure rows, then invalidate every snapshot they touch.
    pub async fn record_exposures(&self, records: &[ExposureRecord]) -> EclResult<ExposureChange> {
        let rows = self.aggregator.store().insert_exposures(records).await?;
        let scopes: Vec<SnapshotScope> = records.iter().map(ExposureRecord::snapshot).collect();
        let invalidation = self.invalidate_snapshots(&scopes).await?;
        Ok(ExposureChange { rows, invalidation })
    }

    /// Delete a snapshot, then invalidate the summaries that covered it.
    pub async fn remove_snapshot(&self, scope: &SnapshotScope) -> EclResult<ExposureChange> {
        let rows = self.aggregator.store().delete_snapshot(scope).await?;
        let invalidation = self.invalidate_snapshots(std::slice::from_ref(scope)).await?;
        Ok(ExposureChange { rows, invalidation })
    }
}
