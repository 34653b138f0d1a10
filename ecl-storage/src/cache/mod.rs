//! Threshold summary cache with pattern-based invalidation.
//!
//! Summaries are stored under string keys built by the codec in [`key`].
//! Backends (in-memory or LMDB) answer point lookups and list keys by
//! prefix. Invalidation lists the keys under a pattern's literal prefix,
//! filters them with the segment matcher in [`matcher`] and evicts the
//! matches while holding the cache's write lock.
//!
//! # Key Format
//!
//! ```text
//! ecl_threshold_summary:{asOfDate|latest}:{branchId|all}:{currency|all}:{threshold}
//! ecl_threshold_summary:{asOfDate|*}:{branchId|*}:{currency|*}:          (pattern)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let cache = SummaryCache::new(Arc::new(InMemoryCacheBackend::new()), ttl);
//! cache.set(&key, &summary).await?;
//!
//! // A data change for one branch evicts every threshold variant
//! let pattern = InvalidationPattern::new(Some(branch_id), None, None);
//! cache.invalidate_by_pattern(&pattern).await?;
//! ```

pub mod key;
pub mod lmdb_backend;
pub mod matcher;
pub mod memory_backend;
pub mod summary_cache;
pub mod traits;

pub use key::{
    encode_key, encode_pattern, namespace_prefix, InvalidationPattern, PatternSegment,
    SummaryCacheKey,
};
pub use lmdb_backend::{LmdbCacheBackend, LmdbCacheError};
pub use matcher::{matches_pattern, select_matching};
pub use memory_backend::InMemoryCacheBackend;
pub use summary_cache::{InvalidationOutcome, SummaryCache};
pub use traits::{CacheBackend, CacheStats};
