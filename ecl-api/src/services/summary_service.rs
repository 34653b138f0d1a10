//! Summary Service
//!
//! Erases the store and cache backend types of a
//! [`ThresholdSummaryService`] so the router can hold one shared handle no
//! matter which combination was configured at startup.

use std::sync::Arc;

use async_trait::async_trait;
use ecl_core::{
    AsOfDate, BranchId, EclError, EclResult, ExposureRecord, SnapshotScope, ThresholdSummaryQuery,
};
use ecl_storage::{
    CacheBackend, ExposureChange, ExposureStore, InMemoryCacheBackend, InMemoryExposureStore,
    InvalidationOutcome, LmdbCacheBackend, SummaryRead, ThresholdSummaryService,
};

use crate::config::{ApiConfig, CacheBackendKind, ExposureStoreKind};
use crate::db::{DbConfig, PgExposureStore};
use crate::error::{ApiError, ApiResult};

/// Operations the HTTP layer needs from the summary service.
#[async_trait]
pub trait SummaryApi: Send + Sync {
    /// Threshold summary for a validated query, cached when enabled.
    async fn summarize(&self, query: &ThresholdSummaryQuery) -> EclResult<SummaryRead>;

    /// Insert rows and evict every summary they affect.
    async fn record_exposures(&self, records: &[ExposureRecord]) -> EclResult<ExposureChange>;

    /// Delete a snapshot and evict every summary that covered it.
    async fn remove_snapshot(&self, scope: &SnapshotScope) -> EclResult<ExposureChange>;

    /// Evict every cached summary.
    async fn invalidate_all(&self) -> EclResult<InvalidationOutcome>;

    /// Returns true if the branch already has rows on that date.
    async fn has_snapshot(&self, branch_id: BranchId, as_of_date: AsOfDate) -> EclResult<bool>;

    /// Number of summary keys currently stored.
    async fn cached_key_count(&self) -> EclResult<usize>;

    /// Check that the exposure store is reachable.
    async fn health_check(&self) -> EclResult<()>;

    fn cache_enabled(&self) -> bool;
}

/// Shared handle used by the router state.
pub type SharedSummaryService = Arc<dyn SummaryApi>;

/// Wrap a concrete service in the shared handle.
pub fn shared_service<S, B>(service: ThresholdSummaryService<S, B>) -> SharedSummaryService
where
    S: ExposureStore + 'static,
    B: CacheBackend + 'static,
{
    Arc::new(service)
}

/// Pair an exposure store with the configured cache backend.
pub fn with_configured_cache<S>(store: Arc<S>, config: &ApiConfig) -> ApiResult<SharedSummaryService>
where
    S: ExposureStore + 'static,
{
    match config.cache_backend {
        CacheBackendKind::Memory => Ok(shared_service(ThresholdSummaryService::from_config(
            store,
            Arc::new(InMemoryCacheBackend::new()),
            &config.ecl,
        ))),
        CacheBackendKind::Lmdb => {
            let backend = LmdbCacheBackend::new(&config.lmdb_path, config.lmdb_max_mb)
                .map_err(|e| ApiError::from(EclError::from(e)))?;
            tracing::info!(
                path = %config.lmdb_path.display(),
                max_mb = config.lmdb_max_mb,
                "Opened LMDB summary cache"
            );
            Ok(shared_service(ThresholdSummaryService::from_config(
                store,
                Arc::new(backend),
                &config.ecl,
            )))
        }
    }
}

/// Build the summary service selected by the configuration.
///
/// The PostgreSQL store gets its table created if missing.
pub async fn build_summary_service(
    config: &ApiConfig,
    db_config: &DbConfig,
) -> ApiResult<SharedSummaryService> {
    config.validate()?;

    match config.exposure_store {
        ExposureStoreKind::Memory => {
            tracing::info!("Using in-memory exposure store");
            with_configured_cache(Arc::new(InMemoryExposureStore::new()), config)
        }
        ExposureStoreKind::Postgres => {
            let store = PgExposureStore::from_config(db_config)?;
            store.ensure_schema().await?;
            tracing::info!(
                host = %db_config.host,
                dbname = %db_config.dbname,
                "Using PostgreSQL exposure store"
            );
            with_configured_cache(Arc::new(store), config)
        }
    }
}

#[async_trait]
impl<S, B> SummaryApi for ThresholdSummaryService<S, B>
where
    S: ExposureStore + 'static,
    B: CacheBackend + 'static,
{
    async fn summarize(&self, query: &ThresholdSummaryQuery) -> EclResult<SummaryRead> {
        ThresholdSummaryService::summarize(self, query).await
    }

    async fn record_exposures(&self, records: &[ExposureRecord]) -> EclResult<ExposureChange> {
        ThresholdSummaryService::record_exposures(self, records).await
    }

    async fn remove_snapshot(&self, scope: &SnapshotScope) -> EclResult<ExposureChange> {
        ThresholdSummaryService::remove_snapshot(self, scope).await
    }

    async fn invalidate_all(&self) -> EclResult<InvalidationOutcome> {
        ThresholdSummaryService::invalidate_all(self).await
    }

    async fn has_snapshot(&self, branch_id: BranchId, as_of_date: AsOfDate) -> EclResult<bool> {
        self.aggregator()
            .store()
            .has_snapshot(branch_id, as_of_date)
            .await
    }

    async fn cached_key_count(&self) -> EclResult<usize> {
        self.cache().len().await
    }

    async fn health_check(&self) -> EclResult<()> {
        self.aggregator().store().health_check().await
    }

    fn cache_enabled(&self) -> bool {
        ThresholdSummaryService::cache_enabled(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ecl_core::{CurrencyCode, Decimal, EclConfig};
    use uuid::Uuid;

    fn service() -> SharedSummaryService {
        shared_service(ThresholdSummaryService::from_config(
            Arc::new(InMemoryExposureStore::new()),
            Arc::new(InMemoryCacheBackend::new()),
            &EclConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_shared_service_round_trip() {
        let service = service();
        let branch = Uuid::now_v7();
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let usd = CurrencyCode::new("USD").unwrap();

        service
            .record_exposures(&[ExposureRecord::new(
                "C1",
                branch,
                usd,
                date,
                Decimal::from(2_500_000),
            )])
            .await
            .unwrap();
        assert!(service.has_snapshot(branch, date).await.unwrap());

        let query =
            ThresholdSummaryQuery::new(Decimal::from(2_000_000), Some(branch), Some(date), None)
                .unwrap();
        assert!(service.summarize(&query).await.unwrap().was_cache_miss());
        assert!(service.summarize(&query).await.unwrap().was_cache_hit());
        assert_eq!(service.cached_key_count().await.unwrap(), 1);

        let outcome = service.invalidate_all().await.unwrap();
        assert_eq!(outcome.evicted, 1);
        assert_eq!(service.cached_key_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_build_with_lmdb_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = ApiConfig {
            cache_backend: CacheBackendKind::Lmdb,
            lmdb_path: dir.path().join("cache"),
            lmdb_max_mb: 8,
            ..ApiConfig::default()
        };

        let service = build_summary_service(&config, &DbConfig::default())
            .await
            .unwrap();
        let query = ThresholdSummaryQuery::new(Decimal::ONE, None, None, None).unwrap();
        service.summarize(&query).await.unwrap();
        assert_eq!(service.cached_key_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let config = ApiConfig {
            ecl: EclConfig::default().with_cache_ttl(std::time::Duration::ZERO),
            ..ApiConfig::default()
        };
        assert!(build_summary_service(&config, &DbConfig::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_health_check_in_memory() {
        let service = service();
        assert!(service.health_check().await.is_ok());
        assert!(service.cache_enabled());
    }
}
