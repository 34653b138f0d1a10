//! ECL Core - Impairment Reporting Types
//!
//! Data types shared by every crate in the workspace: exposure rows, the
//! threshold summary and its buckets, summary queries, configuration and
//! error types. The only behavior here is the pure threshold classification
//! in [`summary`]; storage and caching live in `ecl-storage`.

pub mod config;
pub mod error;
pub mod exposure;
pub mod query;
pub mod summary;

pub use config::EclConfig;
pub use error::{CacheError, ConfigError, EclError, EclResult, StorageError, ValidationError};
pub use exposure::{
    BranchId, CurrencyCode, CustomerExposureTotal, ExposureFilter, ExposureRecord, SnapshotScope,
};
pub use query::{
    ThresholdSummaryQuery, MAX_AMOUNT_DECIMALS, MAX_AMOUNT_INTEGER_DIGITS, MAX_CURRENCY_LEN,
    MAX_CUSTOMER_ID_LEN, MAX_THRESHOLD_DECIMALS,
};
pub use summary::{classify, ImpairmentBucket, ThresholdSummary};

/// Decimal type used for every monetary amount.
pub use rust_decimal::Decimal;

/// Calendar date of an exposure snapshot.
pub type AsOfDate = chrono::NaiveDate;

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Processing date used when no exposure snapshot exists.
pub fn current_processing_date() -> AsOfDate {
    chrono::Utc::now().date_naive()
}
