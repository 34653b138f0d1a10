//! Sample Portfolio Seeder
//!
//! Loads a deterministic demo portfolio for one branch, currency and date:
//! 1,390 customers above a 2,000,000 threshold and 1,063 below it. Seeding
//! goes through the summary service so any cached summary for that snapshot
//! is evicted as well.

use chrono::NaiveDate;
use ecl_core::{current_processing_date, AsOfDate, BranchId, CurrencyCode, Decimal, ExposureRecord};
use rand::{rngs::StdRng, Rng, SeedableRng};
use uuid::Uuid;

use super::summary_service::SummaryApi;
use crate::error::{ApiError, ApiResult};

/// RNG seed; the same seed always yields the same amounts.
pub const SAMPLE_SEED: u64 = 42;

/// Customers generated above the threshold.
pub const INDIVIDUAL_CUSTOMERS: usize = 1_390;

/// Customers generated below the threshold.
pub const COLLECTIVE_CUSTOMERS: usize = 1_063;

/// Branch used when `ECL_SEED_BRANCH_ID` is not set.
pub const DEFAULT_SAMPLE_BRANCH: Uuid = Uuid::from_u128(0x0190_0000_0000_7000_8000_0000_0000_0001);

// Amount ranges in cents, upper bound exclusive.
const INDIVIDUAL_CENTS: std::ops::Range<i64> = 200_000_000..700_000_000;
const COLLECTIVE_CENTS: std::ops::Range<i64> = 0..190_000_000;

/// Target snapshot of the sample portfolio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedOptions {
    pub branch_id: BranchId,
    pub currency: CurrencyCode,
    pub as_of_date: AsOfDate,
}

impl SeedOptions {
    /// Read `ECL_SEED_BRANCH_ID`, `ECL_SEED_CURRENCY` and `ECL_SEED_AS_OF_DATE`
    /// (`YYYY-MM-DD`). Missing values use the defaults; malformed values are
    /// rejected.
    pub fn from_env() -> ApiResult<Self> {
        let branch_id = match std::env::var("ECL_SEED_BRANCH_ID") {
            Ok(raw) => Uuid::parse_str(raw.trim())
                .map_err(|_| ApiError::invalid_format("ECL_SEED_BRANCH_ID", "a UUID"))?,
            Err(_) => DEFAULT_SAMPLE_BRANCH,
        };
        let currency = match std::env::var("ECL_SEED_CURRENCY") {
            Ok(raw) => CurrencyCode::new(raw.trim())?,
            Err(_) => usd()?,
        };
        let as_of_date = match std::env::var("ECL_SEED_AS_OF_DATE") {
            Ok(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| ApiError::invalid_format("ECL_SEED_AS_OF_DATE", "YYYY-MM-DD"))?,
            Err(_) => current_processing_date(),
        };

        Ok(Self {
            branch_id,
            currency,
            as_of_date,
        })
    }
}

fn usd() -> ApiResult<CurrencyCode> {
    Ok(CurrencyCode::new("USD")?)
}

/// Generate the sample rows. Amounts depend only on [`SAMPLE_SEED`].
pub fn sample_exposures(options: &SeedOptions) -> Vec<ExposureRecord> {
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    let mut records = Vec::with_capacity(INDIVIDUAL_CUSTOMERS + COLLECTIVE_CUSTOMERS);

    let mut push = |customer_id: String, cents: i64| {
        records.push(ExposureRecord::new(
            customer_id,
            options.branch_id,
            options.currency.clone(),
            options.as_of_date,
            Decimal::new(cents, 2),
        ));
    };

    for i in 1..=INDIVIDUAL_CUSTOMERS {
        let cents = rng.random_range(INDIVIDUAL_CENTS);
        push(format!("CUST-IND-{:06}", i), cents);
    }
    for i in 1..=COLLECTIVE_CUSTOMERS {
        let cents = rng.random_range(COLLECTIVE_CENTS);
        push(format!("CUST-COL-{:06}", i), cents);
    }

    records
}

/// Seed the sample portfolio unless the snapshot already has rows.
///
/// Returns the number of rows written (0 when skipped).
pub async fn seed_sample_portfolio(service: &dyn SummaryApi, options: &SeedOptions) -> ApiResult<u64> {
    if service
        .has_snapshot(options.branch_id, options.as_of_date)
        .await?
    {
        tracing::info!(
            branch_id = %options.branch_id,
            as_of_date = %options.as_of_date,
            "Sample exposure data already exists, skipping seed"
        );
        return Ok(0);
    }

    let records = sample_exposures(options);
    let change = service.record_exposures(&records).await?;

    tracing::info!(
        branch_id = %options.branch_id,
        as_of_date = %options.as_of_date,
        rows = change.rows,
        individual = INDIVIDUAL_CUSTOMERS,
        collective = COLLECTIVE_CUSTOMERS,
        evicted = change.invalidation.evicted,
        "Seeded sample exposure data"
    );
    Ok(change.rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::shared_service;
    use ecl_core::{EclConfig, ThresholdSummaryQuery};
    use ecl_storage::{InMemoryCacheBackend, InMemoryExposureStore, ThresholdSummaryService};
    use std::sync::Arc;

    fn options() -> SeedOptions {
        SeedOptions {
            branch_id: DEFAULT_SAMPLE_BRANCH,
            currency: CurrencyCode::new("USD").unwrap(),
            as_of_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        }
    }

    #[test]
    fn test_sample_is_deterministic() {
        let a = sample_exposures(&options());
        let b = sample_exposures(&options());

        assert_eq!(a.len(), INDIVIDUAL_CUSTOMERS + COLLECTIVE_CUSTOMERS);
        let amounts_a: Vec<Decimal> = a.iter().map(|r| r.amortized_cost).collect();
        let amounts_b: Vec<Decimal> = b.iter().map(|r| r.amortized_cost).collect();
        assert_eq!(amounts_a, amounts_b);
    }

    #[test]
    fn test_sample_amount_ranges() {
        let threshold = Decimal::from(2_000_000);
        let records = sample_exposures(&options());
        let (individual, collective) = records.split_at(INDIVIDUAL_CUSTOMERS);

        assert!(individual.iter().all(|r| r.amortized_cost >= threshold
            && r.amortized_cost < Decimal::from(7_000_000)));
        assert!(collective.iter().all(|r| r.amortized_cost >= Decimal::ZERO
            && r.amortized_cost < Decimal::from(1_900_000)));
        assert!(records.iter().all(|r| r.amortized_cost.scale() <= 2));
        assert_eq!(individual[0].customer_id, "CUST-IND-000001");
        assert_eq!(collective[0].customer_id, "CUST-COL-000001");
    }

    #[tokio::test]
    async fn test_seed_once_then_skip() {
        let service = shared_service(ThresholdSummaryService::from_config(
            Arc::new(InMemoryExposureStore::new()),
            Arc::new(InMemoryCacheBackend::new()),
            &EclConfig::default(),
        ));
        let opts = options();

        let written = seed_sample_portfolio(service.as_ref(), &opts).await.unwrap();
        assert_eq!(written as usize, INDIVIDUAL_CUSTOMERS + COLLECTIVE_CUSTOMERS);
        assert_eq!(seed_sample_portfolio(service.as_ref(), &opts).await.unwrap(), 0);

        let query = ThresholdSummaryQuery::new(
            Decimal::from(2_000_000),
            Some(opts.branch_id),
            Some(opts.as_of_date),
            None,
        )
        .unwrap();
        let summary = service.summarize(&query).await.unwrap().into_summary();
        assert_eq!(summary.individual.customer_count, INDIVIDUAL_CUSTOMERS as u64);
        assert_eq!(summary.collective.customer_count, COLLECTIVE_CUSTOMERS as u64);
        assert!(summary.is_consistent());
    }
}
