//! Error types for ECL operations

use thiserror::Error;

/// Request validation errors.
///
/// These are raised before any aggregation runs and map to client errors at
/// the API boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("{field} must not exceed {max} characters")]
    TooLong { field: String, max: usize },
}

/// Exposure store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Query failed on {store}: {reason}")]
    QueryFailed { store: String, reason: String },

    #[error("Insert failed on {store}: {reason}")]
    InsertFailed { store: String, reason: String },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Summary cache backend errors.
///
/// The summary service treats all of these as best-effort failures: they are
/// logged and the request falls through to recomputation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Failed to encode cache entry {key}: {reason}")]
    Encode { key: String, reason: String },

    #[error("Failed to decode cache entry {key}: {reason}")]
    Decode { key: String, reason: String },

    #[error("Cache capacity exhausted")]
    Full,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all ECL errors.
#[derive(Debug, Clone, Error)]
pub enum EclError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl EclError {
    /// Returns true if the error was caused by invalid caller input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type alias for ECL operations.
pub type EclResult<T> = Result<T, EclError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_too_long() {
        let err = ValidationError::TooLong {
            field: "currency".to_string(),
            max: 10,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("currency"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn test_storage_error_display_query_failed() {
        let err = StorageError::QueryFailed {
            store: "postgres".to_string(),
            reason: "connection reset".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("postgres"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_cache_error_display_decode() {
        let err = CacheError::Decode {
            key: "ecl_threshold_summary:latest:all:all:1.0000".to_string(),
            reason: "truncated".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("latest:all:all"));
        assert!(msg.contains("truncated"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "ECL_CACHE_TTL_SECS".to_string(),
            value: "abc".to_string(),
            reason: "must be an integer".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("ECL_CACHE_TTL_SECS"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn test_ecl_error_from_variants() {
        let validation = EclError::from(ValidationError::RequiredFieldMissing {
            field: "threshold".to_string(),
        });
        assert!(matches!(validation, EclError::Validation(_)));
        assert!(validation.is_validation());

        let storage = EclError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, EclError::Storage(_)));
        assert!(!storage.is_validation());

        let cache = EclError::from(CacheError::Full);
        assert!(matches!(cache, EclError::Cache(_)));

        let config = EclError::from(ConfigError::MissingRequired {
            field: "ECL_DB_HOST".to_string(),
        });
        assert!(matches!(config, EclError::Config(_)));
    }
}
