//! ECL Test Utilities
//!
//! Shared test infrastructure for the ECL workspace:
//! - Proptest generators for exposure rows and customer totals
//! - Fixtures for the reference portfolio and in-memory services
//! - Assertions for summary consistency and error variants

pub use ecl_core::{
    classify, AsOfDate, BranchId, CurrencyCode, CustomerExposureTotal, Decimal, EclConfig,
    EclError, EclResult, ExposureRecord, ImpairmentBucket, StorageError, ThresholdSummary,
    ThresholdSummaryQuery, ValidationError,
};
pub use ecl_storage::{InMemoryCacheBackend, InMemoryExposureStore, ThresholdSummaryService};

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

/// Summary service backed entirely by memory.
pub type InMemorySummaryService = ThresholdSummaryService<InMemoryExposureStore, InMemoryCacheBackend>;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating exposure data.

    use super::*;
    use proptest::prelude::*;

    /// Generate a random UUID for branch ids.
    pub fn arb_branch_id() -> impl Strategy<Value = BranchId> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a currency from a small fixed set.
    pub fn arb_currency() -> impl Strategy<Value = CurrencyCode> {
        prop_oneof![Just("USD"), Just("EUR"), Just("IDR"), Just("SGD")]
            .prop_filter_map("valid currency", |code| CurrencyCode::new(code).ok())
    }

    /// Generate a snapshot date in 2020-2029.
    pub fn arb_as_of_date() -> impl Strategy<Value = AsOfDate> {
        (2020i32..2030, 1u32..=12, 1u32..=28)
            .prop_filter_map("valid date", |(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
    }

    /// Generate a non-negative amount with two decimal places, below 10 million.
    pub fn arb_amount() -> impl Strategy<Value = Decimal> {
        (0i64..1_000_000_000).prop_map(|cents| Decimal::new(cents, 2))
    }

    /// Generate a strictly positive threshold with two decimal places.
    pub fn arb_threshold() -> impl Strategy<Value = Decimal> {
        (1i64..1_000_000_000).prop_map(|cents| Decimal::new(cents, 2))
    }

    /// Generate a customer id from a small pool so ids repeat across rows.
    pub fn arb_customer_id() -> impl Strategy<Value = String> {
        (1u32..=20).prop_map(|n| format!("C{}", n))
    }

    /// Generate one summed customer total.
    pub fn arb_customer_total() -> impl Strategy<Value = CustomerExposureTotal> {
        (arb_customer_id(), arb_amount())
            .prop_map(|(id, amount)| CustomerExposureTotal::new(id, amount))
    }

    /// Generate customer totals with unique ids, as the aggregation yields.
    pub fn arb_customer_totals() -> impl Strategy<Value = Vec<CustomerExposureTotal>> {
        prop::collection::btree_map(arb_customer_id(), arb_amount(), 0..20).prop_map(|totals| {
            totals
                .into_iter()
                .map(|(id, amount)| CustomerExposureTotal::new(id, amount))
                .collect()
        })
    }

    /// Generate an exposure row in the given snapshot.
    pub fn arb_exposure_in(
        branch_id: BranchId,
        currency: CurrencyCode,
        as_of_date: AsOfDate,
    ) -> impl Strategy<Value = ExposureRecord> {
        (arb_customer_id(), arb_amount()).prop_map(move |(customer_id, amount)| {
            ExposureRecord::new(customer_id, branch_id, currency.clone(), as_of_date, amount)
        })
    }

    /// Generate an exposure row with every dimension random.
    pub fn arb_exposure() -> impl Strategy<Value = ExposureRecord> {
        (
            arb_customer_id(),
            arb_branch_id(),
            arb_currency(),
            arb_as_of_date(),
            arb_amount(),
        )
            .prop_map(|(customer_id, branch_id, currency, as_of_date, amount)| {
                ExposureRecord::new(customer_id, branch_id, currency, as_of_date, amount)
            })
    }

    /// Generate rows for a single snapshot; customers may span several rows.
    pub fn arb_snapshot_rows(
        branch_id: BranchId,
        currency: CurrencyCode,
        as_of_date: AsOfDate,
    ) -> impl Strategy<Value = Vec<ExposureRecord>> {
        prop::collection::vec(arb_exposure_in(branch_id, currency, as_of_date), 0..40)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;

    /// Branch of the reference portfolio.
    pub const REFERENCE_BRANCH: Uuid = Uuid::from_u128(0x0190_0000_0000_7000_8000_0000_0000_00aa);

    /// Threshold of the reference portfolio.
    pub fn reference_threshold() -> Decimal {
        Decimal::from(2_000_000)
    }

    /// Snapshot date of the reference portfolio.
    pub fn reference_date() -> AsOfDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default()
    }

    pub fn usd() -> CurrencyCode {
        currency("USD")
    }

    /// Build a currency code, panicking on invalid input.
    #[track_caller]
    pub fn currency(code: &str) -> CurrencyCode {
        match CurrencyCode::new(code) {
            Ok(code) => code,
            Err(e) => panic!("invalid test currency {:?}: {}", code, e),
        }
    }

    /// Exposure row in the reference snapshot.
    pub fn exposure(customer_id: &str, amount: i64) -> ExposureRecord {
        ExposureRecord::new(
            customer_id,
            REFERENCE_BRANCH,
            usd(),
            reference_date(),
            Decimal::from(amount),
        )
    }

    /// C1 2,100,000; C2 1,000,000 + 900,000; C3 500,000.
    ///
    /// Against a 2,000,000 threshold: one individual customer (2,100,000),
    /// two collective customers (2,400,000), three in total (4,500,000).
    pub fn reference_portfolio() -> Vec<ExposureRecord> {
        vec![
            exposure("C1", 2_100_000),
            exposure("C2", 1_000_000),
            exposure("C2", 900_000),
            exposure("C3", 500_000),
        ]
    }

    /// Expected summary of [`reference_portfolio`] at [`reference_threshold`].
    pub fn reference_summary() -> ThresholdSummary {
        ThresholdSummary {
            individual: ImpairmentBucket {
                customer_count: 1,
                amortized_cost: Decimal::from(2_100_000),
            },
            collective: ImpairmentBucket {
                customer_count: 2,
                amortized_cost: Decimal::from(2_400_000),
            },
            grand_total: ImpairmentBucket {
                customer_count: 3,
                amortized_cost: Decimal::from(4_500_000),
            },
        }
    }

    /// Query for the reference snapshot at the reference threshold.
    pub fn reference_query() -> ThresholdSummaryQuery {
        match ThresholdSummaryQuery::new(
            reference_threshold(),
            Some(REFERENCE_BRANCH),
            Some(reference_date()),
            None,
        ) {
            Ok(query) => query,
            Err(e) => panic!("reference query rejected: {}", e),
        }
    }

    /// In-memory service preloaded with `records`.
    pub fn in_memory_service(records: Vec<ExposureRecord>) -> InMemorySummaryService {
        in_memory_service_with(records, &EclConfig::default())
    }

    pub fn in_memory_service_with(
        records: Vec<ExposureRecord>,
        config: &EclConfig,
    ) -> InMemorySummaryService {
        ThresholdSummaryService::from_config(
            Arc::new(InMemoryExposureStore::with_records(records)),
            Arc::new(InMemoryCacheBackend::new()),
            config,
        )
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for summary consistency and error variants.

    use super::*;

    /// Assert that the grand total equals the sum of both buckets.
    #[track_caller]
    pub fn assert_consistent(summary: &ThresholdSummary) {
        assert!(
            summary.is_consistent(),
            "grand total does not add up: {:?}",
            summary
        );
    }

    /// Assert that a summary matches an independent classification of `totals`.
    #[track_caller]
    pub fn assert_matches_classification(
        summary: &ThresholdSummary,
        totals: &[CustomerExposureTotal],
        threshold: Decimal,
    ) {
        let individual: Vec<_> = totals
            .iter()
            .filter(|t| t.total_exposure >= threshold)
            .collect();
        let collective: Vec<_> = totals
            .iter()
            .filter(|t| t.total_exposure < threshold)
            .collect();

        assert_eq!(summary.individual.customer_count, individual.len() as u64);
        assert_eq!(summary.collective.customer_count, collective.len() as u64);
        assert_eq!(
            summary.individual.amortized_cost,
            individual.iter().map(|t| t.total_exposure).sum::<Decimal>()
        );
        assert_eq!(
            summary.collective.amortized_cost,
            collective.iter().map(|t| t.total_exposure).sum::<Decimal>()
        );
        assert_consistent(summary);
    }

    /// Assert that an EclResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &EclResult<T>) {
        match result {
            Err(EclError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that an EclResult is a Storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &EclResult<T>) {
        match result {
            Err(EclError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }
}
