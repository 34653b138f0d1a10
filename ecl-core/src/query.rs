//! Validated threshold summary query.

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::exposure::{BranchId, CurrencyCode, ExposureFilter};
use crate::AsOfDate;

/// Maximum length of a currency code.
pub const MAX_CURRENCY_LEN: usize = 10;

/// Maximum length of a customer identifier.
pub const MAX_CUSTOMER_ID_LEN: usize = 100;

/// Maximum number of significant decimal digits in a threshold.
///
/// Cache keys render the threshold at this scale, so a finer threshold
/// would share a key with a different classification.
pub const MAX_THRESHOLD_DECIMALS: u32 = 4;

/// Decimal places kept for a stored amortized cost (`NUMERIC(18, 4)`).
pub const MAX_AMOUNT_DECIMALS: u32 = 4;

/// Integer digits available to a stored amortized cost (`NUMERIC(18, 4)`).
pub const MAX_AMOUNT_INTEGER_DIGITS: u32 = 14;

/// Parameters of a threshold summary request.
///
/// The only way to build one is [`ThresholdSummaryQuery::new`], which rejects
/// non-positive thresholds and thresholds finer than
/// [`MAX_THRESHOLD_DECIMALS`], so every query reaching the aggregator is valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThresholdSummaryQuery {
    threshold: Decimal,
    branch_id: Option<BranchId>,
    as_of_date: Option<AsOfDate>,
    currency: Option<CurrencyCode>,
}

impl ThresholdSummaryQuery {
    /// Build a query.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Individual significance threshold, must be > 0 with at
    ///   most four significant decimal digits
    /// * `branch_id` - Restrict to one branch (`None` = all branches)
    /// * `as_of_date` - Snapshot date (`None` = latest available)
    /// * `currency` - Restrict to one currency (`None` = all currencies)
    pub fn new(
        threshold: Decimal,
        branch_id: Option<BranchId>,
        as_of_date: Option<AsOfDate>,
        currency: Option<CurrencyCode>,
    ) -> Result<Self, ValidationError> {
        if threshold <= Decimal::ZERO {
            return Err(ValidationError::InvalidValue {
                field: "individualSignificantThreshold".to_string(),
                reason: "Individual significant threshold must be greater than 0".to_string(),
            });
        }
        // Trailing zeros do not count: 100.00000 is the same threshold as 100.
        if threshold.normalize().scale() > MAX_THRESHOLD_DECIMALS {
            return Err(ValidationError::InvalidValue {
                field: "individualSignificantThreshold".to_string(),
                reason: format!(
                    "Individual significant threshold must have at most {} decimal places",
                    MAX_THRESHOLD_DECIMALS
                ),
            });
        }
        Ok(Self {
            threshold,
            branch_id,
            as_of_date,
            currency,
        })
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    pub fn branch_id(&self) -> Option<BranchId> {
        self.branch_id
    }

    pub fn as_of_date(&self) -> Option<AsOfDate> {
        self.as_of_date
    }

    pub fn currency(&self) -> Option<&CurrencyCode> {
        self.currency.as_ref()
    }

    /// Branch/currency filter used for both the latest-date lookup and the
    /// aggregation itself.
    pub fn filter(&self) -> ExposureFilter {
        ExposureFilter::new(self.branch_id, self.currency.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn test_rejects_zero_and_negative_threshold() {
        assert!(ThresholdSummaryQuery::new(Decimal::ZERO, None, None, None).is_err());
        assert!(ThresholdSummaryQuery::new(Decimal::NEGATIVE_ONE, None, None, None).is_err());
    }

    #[test]
    fn test_rejection_message() {
        let err = ThresholdSummaryQuery::new(Decimal::ZERO, None, None, None).unwrap_err();
        assert!(err
            .to_string()
            .contains("Individual significant threshold must be greater than 0"));
    }

    #[test]
    fn test_accepts_small_positive_threshold() {
        let q = ThresholdSummaryQuery::new(Decimal::new(1, 4), None, None, None).unwrap();
        assert_eq!(q.threshold(), Decimal::new(1, 4));
    }

    #[test]
    fn test_rejects_threshold_finer_than_four_decimals() {
        let err = ThresholdSummaryQuery::new(Decimal::new(10_000_004, 5), None, None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidValue { ref field, .. } if field == "individualSignificantThreshold"
        ));
        assert!(err.to_string().contains("at most 4 decimal places"));

        // 0.00004 is positive but cannot be represented at four decimals either.
        assert!(ThresholdSummaryQuery::new(Decimal::new(4, 5), None, None, None).is_err());
    }

    #[test]
    fn test_trailing_zeros_do_not_count_as_decimals() {
        let q = ThresholdSummaryQuery::new(Decimal::new(10_000_000, 5), None, None, None).unwrap();
        assert_eq!(q.threshold(), Decimal::from(100));
        assert!(ThresholdSummaryQuery::new(Decimal::new(1_000_001, 4), None, None, None).is_ok());
    }

    #[test]
    fn test_filter_carries_branch_and_currency() {
        let branch = Uuid::now_v7();
        let usd = CurrencyCode::new("USD").unwrap();
        let q = ThresholdSummaryQuery::new(Decimal::ONE, Some(branch), None, Some(usd.clone()))
            .unwrap();
        let filter = q.filter();
        assert_eq!(filter.branch_id, Some(branch));
        assert_eq!(filter.currency, Some(usd));
    }
}
