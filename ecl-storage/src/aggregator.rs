//! Exposure aggregation for threshold summaries.

use std::sync::Arc;

use ecl_core::{
    classify, current_processing_date, AsOfDate, EclResult, ThresholdSummary,
    ThresholdSummaryQuery,
};
use tracing::debug;

use crate::exposure::ExposureStore;

/// Computes threshold summaries straight from the exposure store.
///
/// Stateless apart from the store handle; caching is the caller's concern.
pub struct ExposureAggregator<S: ExposureStore> {
    store: Arc<S>,
}

impl<S: ExposureStore> Clone for ExposureAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ExposureStore> ExposureAggregator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Get a reference to the exposure store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot date a query runs against.
    ///
    /// An explicit date is used as is. Otherwise the latest date among rows
    /// passing the branch/currency filters, or today's processing date when
    /// no row matches.
    pub async fn resolve_as_of_date(&self, query: &ThresholdSummaryQuery) -> EclResult<AsOfDate> {
        if let Some(date) = query.as_of_date() {
            return Ok(date);
        }
        let latest = self.store.latest_as_of_date(&query.filter()).await?;
        Ok(latest.unwrap_or_else(current_processing_date))
    }

    /// Group matching rows by customer, sum them and classify the totals.
    pub async fn summarize(&self, query: &ThresholdSummaryQuery) -> EclResult<ThresholdSummary> {
        let as_of_date = self.resolve_as_of_date(query).await?;
        let totals = self
            .store
            .customer_totals(&query.filter(), as_of_date)
            .await?;

        let summary = classify(&totals, query.threshold());
        debug!(
            as_of_date = %as_of_date,
            customers = totals.len(),
            individual = summary.individual.customer_count,
            collective = summary.collective.customer_count,
            "Computed threshold summary"
        );
        Ok(summary)
    }
}
