//! ECL Storage - Exposure Store and Summary Cache
//!
//! Defines the exposure store abstraction consumed by the aggregator, the
//! threshold summary cache with its pattern invalidation,
//! and the read-through service that ties them together. The PostgreSQL
//! exposure store lives in `ecl-api`.

pub mod aggregator;
pub mod cache;
pub mod exposure;
pub mod service;

pub use aggregator::ExposureAggregator;
pub use cache::{
    encode_key, encode_pattern, matches_pattern, namespace_prefix, select_matching, CacheBackend,
    CacheStats, InMemoryCacheBackend, InvalidationOutcome, InvalidationPattern, LmdbCacheBackend,
    LmdbCacheError, PatternSegment, SummaryCache, SummaryCacheKey,
};
pub use exposure::{ExposureStore, InMemoryExposureStore};
pub use service::{ExposureChange, SummaryRead, ThresholdSummaryService};
