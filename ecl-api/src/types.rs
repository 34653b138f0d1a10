//! Request and response types for the impairment endpoints.
//!
//! Wire names are camelCase. Requests are parsed leniently (plain strings,
//! optional fields) and validated into domain types afterwards, so the
//! client gets the domain's validation messages instead of serde errors.

use ecl_core::{
    AsOfDate, BranchId, CurrencyCode, Decimal, ExposureRecord, SnapshotScope,
    ThresholdSummaryQuery, ValidationError, MAX_AMOUNT_DECIMALS, MAX_AMOUNT_INTEGER_DIGITS,
    MAX_CUSTOMER_ID_LEN,
};
use ecl_storage::{ExposureChange, InvalidationOutcome};
use serde::{Deserialize, Serialize};

// ============================================================================
// THRESHOLD SUMMARY
// ============================================================================

/// Body of `POST /api/impairment/ecl/threshold-summary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ThresholdSummaryRequest {
    /// Customers with total exposure at or above this amount are individually impaired.
    #[cfg_attr(feature = "openapi", schema(value_type = String, example = "2000000"))]
    pub individual_significant_threshold: Decimal,
    /// Restrict to one branch.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<uuid::Uuid>))]
    pub branch_id: Option<BranchId>,
    /// Snapshot date; latest available when omitted.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<chrono::NaiveDate>))]
    pub as_of_date: Option<AsOfDate>,
    /// Restrict to one currency; empty means all currencies.
    #[serde(default)]
    pub currency: Option<String>,
}

impl ThresholdSummaryRequest {
    /// Validate into a domain query.
    pub fn into_query(self) -> Result<ThresholdSummaryQuery, ValidationError> {
        let currency = CurrencyCode::optional(self.currency.as_deref())?;
        ThresholdSummaryQuery::new(
            self.individual_significant_threshold,
            self.branch_id,
            self.as_of_date,
            currency,
        )
    }
}

// ============================================================================
// EXPOSURE WRITES
// ============================================================================

/// One exposure row as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExposureInput {
    pub customer_id: String,
    #[cfg_attr(feature = "openapi", schema(value_type = uuid::Uuid))]
    pub branch_id: BranchId,
    pub currency: String,
    #[cfg_attr(feature = "openapi", schema(value_type = chrono::NaiveDate))]
    pub as_of_date: AsOfDate,
    #[cfg_attr(feature = "openapi", schema(value_type = String, example = "1250000.50"))]
    pub amortized_cost: Decimal,
}

impl ExposureInput {
    /// Validate into a stored exposure row.
    pub fn into_record(self) -> Result<ExposureRecord, ValidationError> {
        let customer_id = self.customer_id.trim();
        if customer_id.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "customerId".to_string(),
            });
        }
        if customer_id.chars().count() > MAX_CUSTOMER_ID_LEN {
            return Err(ValidationError::TooLong {
                field: "customerId".to_string(),
                max: MAX_CUSTOMER_ID_LEN,
            });
        }
        let currency = CurrencyCode::new(self.currency)?;
        check_amount(self.amortized_cost)?;

        Ok(ExposureRecord::new(
            customer_id,
            self.branch_id,
            currency,
            self.as_of_date,
            self.amortized_cost,
        ))
    }
}

/// Reject amounts the exposure table would round or overflow.
fn check_amount(amount: Decimal) -> Result<(), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidValue {
        field: "amortizedCost".to_string(),
        reason,
    };
    if amount.normalize().scale() > MAX_AMOUNT_DECIMALS {
        return Err(invalid(format!(
            "Amortized cost must have at most {} decimal places",
            MAX_AMOUNT_DECIMALS
        )));
    }
    let limit = Decimal::from(10_u64.pow(MAX_AMOUNT_INTEGER_DIGITS));
    if amount.abs() >= limit {
        return Err(invalid(format!(
            "Amortized cost must have at most {} integer digits",
            MAX_AMOUNT_INTEGER_DIGITS
        )));
    }
    Ok(())
}

/// Body of `POST /api/impairment/ecl/exposures`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateExposuresRequest {
    pub exposures: Vec<ExposureInput>,
}

/// Query string of `DELETE /api/impairment/ecl/exposures`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
#[serde(rename_all = "camelCase")]
pub struct DeleteSnapshotParams {
    #[cfg_attr(feature = "openapi", param(value_type = uuid::Uuid))]
    pub branch_id: BranchId,
    #[cfg_attr(feature = "openapi", param(value_type = chrono::NaiveDate))]
    pub as_of_date: AsOfDate,
    /// Only delete rows in this currency.
    #[serde(default)]
    pub currency: Option<String>,
}

impl DeleteSnapshotParams {
    pub fn into_scope(self) -> Result<SnapshotScope, ValidationError> {
        Ok(SnapshotScope {
            branch_id: self.branch_id,
            as_of_date: self.as_of_date,
            currency: CurrencyCode::optional(self.currency.as_deref())?,
        })
    }
}

// ============================================================================
// RESPONSES
// ============================================================================

/// Cache entries touched by an invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct InvalidationResponse {
    pub matched: usize,
    pub evicted: usize,
    pub retained: usize,
}

impl From<InvalidationOutcome> for InvalidationResponse {
    fn from(outcome: InvalidationOutcome) -> Self {
        Self {
            matched: outcome.matched,
            evicted: outcome.evicted,
            retained: outcome.retained,
        }
    }
}

/// Rows written or deleted and the cache entries evicted as a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExposureChangeResponse {
    pub rows: u64,
    pub invalidation: InvalidationResponse,
}

impl From<ExposureChange> for ExposureChangeResponse {
    fn from(change: ExposureChange) -> Self {
        Self {
            rows: change.rows,
            invalidation: change.invalidation.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_request_uses_camel_case() {
        let json = r#"{"individualSignificantThreshold": 2000000, "currency": "USD"}"#;
        let request: ThresholdSummaryRequest = serde_json::from_str(json).unwrap();
        let query = request.into_query().unwrap();

        assert_eq!(query.threshold(), Decimal::from(2_000_000));
        assert_eq!(query.currency().map(CurrencyCode::as_str), Some("USD"));
        assert!(query.branch_id().is_none());
        assert!(query.as_of_date().is_none());
    }

    #[test]
    fn test_string_threshold_accepted() {
        let json = r#"{"individualSignificantThreshold": "1500000.25", "asOfDate": "2024-12-31"}"#;
        let request: ThresholdSummaryRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            request.individual_significant_threshold,
            Decimal::new(150_000_025, 2)
        );
    }

    #[test]
    fn test_empty_currency_means_all() {
        let request = ThresholdSummaryRequest {
            individual_significant_threshold: Decimal::ONE,
            branch_id: None,
            as_of_date: None,
            currency: Some(String::new()),
        };
        assert!(request.into_query().unwrap().currency().is_none());
    }

    #[test]
    fn test_non_positive_threshold_rejected() {
        let request = ThresholdSummaryRequest {
            individual_significant_threshold: Decimal::ZERO,
            branch_id: None,
            as_of_date: None,
            currency: None,
        };
        assert!(matches!(
            request.into_query(),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_exposure_input_validation() {
        let input = ExposureInput {
            customer_id: "  ".to_string(),
            branch_id: Uuid::now_v7(),
            currency: "USD".to_string(),
            as_of_date: AsOfDate::from_ymd_opt(2024, 12, 31).unwrap(),
            amortized_cost: Decimal::ONE,
        };
        assert!(matches!(
            input.clone().into_record(),
            Err(ValidationError::RequiredFieldMissing { .. })
        ));

        let too_long = ExposureInput {
            customer_id: "C".repeat(MAX_CUSTOMER_ID_LEN + 1),
            ..input.clone()
        };
        assert!(matches!(
            too_long.into_record(),
            Err(ValidationError::TooLong { .. })
        ));

        let ok = ExposureInput {
            customer_id: " C1 ".to_string(),
            ..input
        };
        assert_eq!(ok.into_record().unwrap().customer_id, "C1");
    }

    fn input_with_amount(amount: Decimal) -> ExposureInput {
        ExposureInput {
            customer_id: "C1".to_string(),
            branch_id: Uuid::now_v7(),
            currency: "USD".to_string(),
            as_of_date: AsOfDate::from_ymd_opt(2024, 12, 31).unwrap(),
            amortized_cost: amount,
        }
    }

    fn is_amount_error(result: Result<ExposureRecord, ValidationError>) -> bool {
        matches!(
            result,
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "amortizedCost"
        )
    }

    #[test]
    fn test_amount_scale_is_limited_to_four_decimals() {
        assert!(is_amount_error(
            input_with_amount(Decimal::new(123_455, 5)).into_record()
        ));

        let record = input_with_amount(Decimal::new(12_345, 4)).into_record().unwrap();
        assert_eq!(record.amortized_cost, Decimal::new(12_345, 4));

        // Trailing zeros past the fourth place are not lost precision.
        assert!(input_with_amount(Decimal::new(123_450, 5)).into_record().is_ok());
    }

    #[test]
    fn test_amount_integer_digits_are_limited() {
        let largest = Decimal::new(999_999_999_999_999_999, 4);
        assert!(input_with_amount(largest).into_record().is_ok());
        assert!(input_with_amount(-largest).into_record().is_ok());

        let overflow = Decimal::from(100_000_000_000_000_i64);
        assert!(is_amount_error(input_with_amount(overflow).into_record()));
        assert!(is_amount_error(input_with_amount(-overflow).into_record()));
    }
}
