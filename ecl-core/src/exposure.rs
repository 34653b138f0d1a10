//! Customer exposure rows and the filters applied to them.

use std::fmt;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::query::MAX_CURRENCY_LEN;
use crate::{AsOfDate, Timestamp};

/// Branch identifier.
pub type BranchId = Uuid;

/// Characters that are reserved by the cache key codec.
const RESERVED_CURRENCY_CHARS: [char; 2] = [':', '*'];

/// Short currency code such as `USD` or `EUR`.
///
/// Codes are compared literally (case-sensitive). Construction rejects empty
/// values, codes longer than [`MAX_CURRENCY_LEN`] and codes containing
/// whitespace or characters reserved by the cache key codec, so a code can
/// always be embedded as a single key segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Create a currency code, validating its shape.
    pub fn new(code: impl Into<String>) -> Result<Self, ValidationError> {
        let code = code.into();
        if code.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "currency".to_string(),
            });
        }
        if code.chars().count() > MAX_CURRENCY_LEN {
            return Err(ValidationError::TooLong {
                field: "currency".to_string(),
                max: MAX_CURRENCY_LEN,
            });
        }
        if code
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || RESERVED_CURRENCY_CHARS.contains(&c))
        {
            return Err(ValidationError::InvalidValue {
                field: "currency".to_string(),
                reason: format!("'{}' contains a reserved character", code),
            });
        }
        Ok(Self(code))
    }

    /// Interpret an optional request value: absent or empty means "no filter".
    pub fn optional(code: Option<&str>) -> Result<Option<Self>, ValidationError> {
        match code {
            None => Ok(None),
            Some(c) if c.is_empty() => Ok(None),
            Some(c) => Self::new(c).map(Some),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single amortized-cost exposure row for one customer.
///
/// A customer may appear on several rows for the same branch, currency and
/// date; those rows are summed during aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureRecord {
    pub id: Uuid,
    pub customer_id: String,
    pub branch_id: BranchId,
    pub currency: CurrencyCode,
    pub as_of_date: AsOfDate,
    pub amortized_cost: Decimal,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ExposureRecord {
    /// Create a new exposure row with a fresh id and current timestamps.
    pub fn new(
        customer_id: impl Into<String>,
        branch_id: BranchId,
        currency: CurrencyCode,
        as_of_date: AsOfDate,
        amortized_cost: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            customer_id: customer_id.into(),
            branch_id,
            currency,
            as_of_date,
            amortized_cost,
            created_at: now,
            updated_at: now,
        }
    }

    /// The snapshot this row belongs to.
    pub fn snapshot(&self) -> SnapshotScope {
        SnapshotScope {
            branch_id: self.branch_id,
            as_of_date: self.as_of_date,
            currency: Some(self.currency.clone()),
        }
    }
}

/// Branch and currency filters shared by the date lookup and the aggregation.
///
/// `None` on a field means the dimension is not constrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExposureFilter {
    pub branch_id: Option<BranchId>,
    pub currency: Option<CurrencyCode>,
}

impl ExposureFilter {
    pub fn new(branch_id: Option<BranchId>, currency: Option<CurrencyCode>) -> Self {
        Self {
            branch_id,
            currency,
        }
    }

    /// Returns true if the row passes the branch and currency filters.
    pub fn matches(&self, record: &ExposureRecord) -> bool {
        self.branch_id.map_or(true, |b| record.branch_id == b)
            && self
                .currency
                .as_ref()
                .map_or(true, |c| &record.currency == c)
    }
}

/// Summed exposure of one customer for the resolved filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerExposureTotal {
    pub customer_id: String,
    pub total_exposure: Decimal,
}

impl CustomerExposureTotal {
    pub fn new(customer_id: impl Into<String>, total_exposure: Decimal) -> Self {
        Self {
            customer_id: customer_id.into(),
            total_exposure,
        }
    }
}

/// The set of exposure rows touched by a write, used to drive invalidation.
///
/// A `None` currency means every currency of the branch/date snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotScope {
    pub branch_id: BranchId,
    pub as_of_date: AsOfDate,
    pub currency: Option<CurrencyCode>,
}
