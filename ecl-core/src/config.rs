//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Default lifetime of a cached threshold summary.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// Settings of the threshold summary engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EclConfig {
    /// Lifetime of a cached summary, counted from the time it is stored.
    #[serde(with = "duration_secs")]
    pub cache_ttl: Duration,
    /// Whether summaries are cached at all.
    pub cache_enabled: bool,
}

impl Default for EclConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_enabled: true,
        }
    }
}

impl EclConfig {
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_enabled && self.cache_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "cache_ttl".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero when caching is enabled".to_string(),
            });
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
