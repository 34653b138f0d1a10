//! API Configuration Module
//!
//! Settings for the HTTP server: CORS, which exposure store and cache backend
//! to run, cache lifetime and sample-data seeding. Configuration is loaded
//! from `ECL_*` environment variables with defaults suited to development.

use std::path::PathBuf;
use std::time::Duration;

use ecl_core::{ConfigError, EclConfig};

/// Default LMDB map size for the summary cache, in megabytes.
pub const DEFAULT_LMDB_MAX_MB: usize = 64;

/// Where exposure rows are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureStoreKind {
    /// Rows held in process memory.
    Memory,
    /// The `customer_exposures` table in PostgreSQL.
    Postgres,
}

/// Which backend stores cached summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    Lmdb,
}

fn parse_store_kind(value: &str) -> Option<ExposureStoreKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "memory" | "in-memory" => Some(ExposureStoreKind::Memory),
        "postgres" | "postgresql" | "pg" => Some(ExposureStoreKind::Postgres),
        _ => None,
    }
}

fn parse_cache_kind(value: &str) -> Option<CacheBackendKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "memory" | "in-memory" => Some(CacheBackendKind::Memory),
        "lmdb" => Some(CacheBackendKind::Lmdb),
        _ => None,
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Storage Configuration
    // ========================================================================
    /// Exposure store implementation.
    pub exposure_store: ExposureStoreKind,

    /// Summary cache backend implementation.
    pub cache_backend: CacheBackendKind,

    /// Directory of the LMDB environment when `cache_backend` is LMDB.
    pub lmdb_path: PathBuf,

    /// LMDB map size in megabytes.
    pub lmdb_max_mb: usize,

    /// Cache lifetime and on/off switch.
    pub ecl: EclConfig,

    /// Load the deterministic sample portfolio on startup.
    pub seed_sample_data: bool,

    /// Record Prometheus metrics and serve `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors_origins: Vec::new(),
            cors_max_age_secs: 86400, // 24 hours
            exposure_store: ExposureStoreKind::Memory,
            cache_backend: CacheBackendKind::Memory,
            lmdb_path: PathBuf::from("./data/summary-cache"),
            lmdb_max_mb: DEFAULT_LMDB_MAX_MB,
            ecl: EclConfig::default(),
            seed_sample_data: false,
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ECL_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `ECL_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `ECL_EXPOSURE_STORE`: `memory` or `postgres` (default: memory)
    /// - `ECL_CACHE_BACKEND`: `memory` or `lmdb` (default: memory)
    /// - `ECL_CACHE_LMDB_PATH`: LMDB directory (default: ./data/summary-cache)
    /// - `ECL_CACHE_LMDB_MAX_MB`: LMDB map size (default: 64)
    /// - `ECL_CACHE_TTL_SECS`: Cached summary lifetime (default: 900)
    /// - `ECL_CACHE_ENABLED`: "true" or "false" (default: true)
    /// - `ECL_SEED_SAMPLE_DATA`: "true" or "false" (default: false)
    /// - `ECL_METRICS_ENABLED`: "true" or "false" (default: true)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let cors_origins = lookup("ECL_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_max_age_secs = lookup("ECL_CORS_MAX_AGE_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let exposure_store = lookup("ECL_EXPOSURE_STORE")
            .and_then(|s| parse_store_kind(&s))
            .unwrap_or(defaults.exposure_store);

        let cache_backend = lookup("ECL_CACHE_BACKEND")
            .and_then(|s| parse_cache_kind(&s))
            .unwrap_or(defaults.cache_backend);

        let lmdb_path = lookup("ECL_CACHE_LMDB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.lmdb_path);

        let lmdb_max_mb = lookup("ECL_CACHE_LMDB_MAX_MB")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.lmdb_max_mb);

        let cache_ttl = lookup("ECL_CACHE_TTL_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.ecl.cache_ttl);

        let cache_enabled = lookup("ECL_CACHE_ENABLED")
            .map(|s| s.trim().to_ascii_lowercase() != "false")
            .unwrap_or(defaults.ecl.cache_enabled);

        let seed_sample_data = lookup("ECL_SEED_SAMPLE_DATA")
            .map(|s| parse_flag(&s))
            .unwrap_or(defaults.seed_sample_data);

        let metrics_enabled = lookup("ECL_METRICS_ENABLED")
            .map(|s| parse_flag(&s))
            .unwrap_or(defaults.metrics_enabled);

        Self {
            cors_origins,
            cors_max_age_secs,
            exposure_store,
            cache_backend,
            lmdb_path,
            lmdb_max_mb,
            ecl: EclConfig::default()
                .with_cache_ttl(cache_ttl)
                .with_cache_enabled(cache_enabled),
            seed_sample_data,
            metrics_enabled,
        }
    }

    /// Validate settings that have no usable fallback.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ecl.validate()?;
        if self.cache_backend == CacheBackendKind::Lmdb && self.lmdb_max_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ECL_CACHE_LMDB_MAX_MB".to_string(),
                value: "0".to_string(),
                reason: "LMDB map size must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }
}
