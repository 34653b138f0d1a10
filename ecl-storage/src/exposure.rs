//! Exposure store abstraction and the in-process implementation.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use ecl_core::{
    AsOfDate, BranchId, CustomerExposureTotal, Decimal, EclResult, ExposureFilter, ExposureRecord,
    SnapshotScope, StorageError,
};

/// Source of amortized-cost exposure rows.
///
/// Read methods take an [`ExposureFilter`]; `None` fields are unconstrained.
/// Write methods exist so exposure changes can be paired with cache
/// invalidation by the caller.
#[async_trait]
pub trait ExposureStore: Send + Sync {
    /// Most recent as-of date among rows passing `filter`, if any.
    async fn latest_as_of_date(&self, filter: &ExposureFilter) -> EclResult<Option<AsOfDate>>;

    /// Per-customer sum of amortized cost for rows passing `filter` on the
    /// exact `as_of_date`. Customers are returned in ascending id order.
    async fn customer_totals(
        &self,
        filter: &ExposureFilter,
        as_of_date: AsOfDate,
    ) -> EclResult<Vec<CustomerExposureTotal>>;

    /// Append exposure rows. Returns the number of rows written.
    async fn insert_exposures(&self, records: &[ExposureRecord]) -> EclResult<u64>;

    /// Delete every row of a snapshot. Returns the number of rows removed.
    async fn delete_snapshot(&self, scope: &SnapshotScope) -> EclResult<u64>;

    /// Returns true if any row exists for the branch on that date.
    async fn has_snapshot(&self, branch_id: BranchId, as_of_date: AsOfDate) -> EclResult<bool>;

    /// Check that the store is reachable.
    async fn health_check(&self) -> EclResult<()> {
        Ok(())
    }
}

/// Exposure rows held in memory behind a lock.
#[derive(Debug, Default)]
pub struct InMemoryExposureStore {
    rows: RwLock<Vec<ExposureRecord>>,
}

impl InMemoryExposureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with rows.
    pub fn with_records(records: Vec<ExposureRecord>) -> Self {
        Self {
            rows: RwLock::new(records),
        }
    }

    /// Number of rows held.
    pub fn len(&self) -> EclResult<usize> {
        let rows = self.rows.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(rows.len())
    }

    pub fn is_empty(&self) -> EclResult<bool> {
        Ok(self.len()? == 0)
    }
}

fn in_scope(scope: &SnapshotScope, record: &ExposureRecord) -> bool {
    record.branch_id == scope.branch_id
        && record.as_of_date == scope.as_of_date
        && scope.currency.as_ref().map_or(true, |c| &record.currency == c)
}

#[async_trait]
impl ExposureStore for InMemoryExposureStore {
    async fn latest_as_of_date(&self, filter: &ExposureFilter) -> EclResult<Option<AsOfDate>> {
        let rows = self.rows.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(rows
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| r.as_of_date)
            .max())
    }

    async fn customer_totals(
        &self,
        filter: &ExposureFilter,
        as_of_date: AsOfDate,
    ) -> EclResult<Vec<CustomerExposureTotal>> {
        let rows = self.rows.read().map_err(|_| StorageError::LockPoisoned)?;

        let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();
        for row in rows
            .iter()
            .filter(|r| r.as_of_date == as_of_date && filter.matches(r))
        {
            *totals.entry(row.customer_id.as_str()).or_default() += row.amortized_cost;
        }

        Ok(totals
            .into_iter()
            .map(|(customer_id, total)| CustomerExposureTotal::new(customer_id, total))
            .collect())
    }

    async fn insert_exposures(&self, records: &[ExposureRecord]) -> EclResult<u64> {
        let mut rows = self.rows.write().map_err(|_| StorageError::LockPoisoned)?;
        rows.extend_from_slice(records);
        Ok(records.len() as u64)
    }

    async fn delete_snapshot(&self, scope: &SnapshotScope) -> EclResult<u64> {
        let mut rows = self.rows.write().map_err(|_| StorageError::LockPoisoned)?;
        let before = rows.len();
        rows.retain(|r| !in_scope(scope, r));
        Ok((before - rows.len()) as u64)
    }

    async fn has_snapshot(&self, branch_id: BranchId, as_of_date: AsOfDate) -> EclResult<bool> {
        let rows = self.rows.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(rows
            .iter()
            .any(|r| r.branch_id == branch_id && r.as_of_date == as_of_date))
    }
}
