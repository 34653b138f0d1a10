//! Cache key codec for threshold summaries.
//!
//! Keys and invalidation patterns share one layout so the matcher can compare
//! them segment by segment. The namespace segment comes first, followed by
//! the as-of date, branch, currency and (keys only) threshold.

use std::fmt;

use ecl_core::{AsOfDate, BranchId, CurrencyCode, ThresholdSummaryQuery, MAX_THRESHOLD_DECIMALS};
use rust_decimal::{Decimal, RoundingStrategy};

/// Leading segment shared by every threshold summary key.
pub const NAMESPACE: &str = "ecl_threshold_summary";

/// Separator between key segments.
pub const SEPARATOR: char = ':';

/// Pattern segment that matches any key segment.
pub const WILDCARD: &str = "*";

/// Date segment of a key built without an explicit as-of date.
pub const LATEST: &str = "latest";

/// Branch or currency segment of a key built without that filter.
pub const ALL: &str = "all";

/// Number of decimal digits in the threshold segment.
///
/// Queries reject finer thresholds, so for any query the segment is exact.
pub const THRESHOLD_DECIMALS: u32 = MAX_THRESHOLD_DECIMALS;

/// Render a threshold with exactly [`THRESHOLD_DECIMALS`] digits, rounding
/// half away from zero.
pub fn format_threshold(threshold: Decimal) -> String {
    let rounded =
        threshold.round_dp_with_strategy(THRESHOLD_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.4}", rounded)
}

/// Cache key of one threshold summary.
///
/// Absent filters are encoded with the `latest` / `all` sentinels, so two
/// requests with the same effective filters always map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryCacheKey {
    as_of_date: Option<AsOfDate>,
    branch_id: Option<BranchId>,
    currency: Option<CurrencyCode>,
    threshold: Decimal,
}

impl SummaryCacheKey {
    pub fn new(
        as_of_date: Option<AsOfDate>,
        branch_id: Option<BranchId>,
        currency: Option<CurrencyCode>,
        threshold: Decimal,
    ) -> Self {
        Self {
            as_of_date,
            branch_id,
            currency,
            threshold,
        }
    }

    /// Key for a query, using the date as requested (not as resolved).
    pub fn from_query(query: &ThresholdSummaryQuery) -> Self {
        Self::new(
            query.as_of_date(),
            query.branch_id(),
            query.currency().cloned(),
            query.threshold(),
        )
    }

    pub fn as_of_date(&self) -> Option<AsOfDate> {
        self.as_of_date
    }

    pub fn branch_id(&self) -> Option<BranchId> {
        self.branch_id
    }

    pub fn currency(&self) -> Option<&CurrencyCode> {
        self.currency.as_ref()
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// Encode to the string form stored in the cache.
    pub fn encode(&self) -> String {
        let as_of_date = self
            .as_of_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| LATEST.to_string());
        let branch_id = self
            .branch_id
            .map(|b| b.to_string())
            .unwrap_or_else(|| ALL.to_string());
        let currency = self
            .currency
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_else(|| ALL.to_string());

        [
            NAMESPACE,
            &as_of_date,
            &branch_id,
            &currency,
            &format_threshold(self.threshold),
        ]
        .join(&SEPARATOR.to_string())
    }
}

impl fmt::Display for SummaryCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// One dimension of an invalidation pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternSegment {
    /// Matches any value in this position.
    Any,
    /// Matches exactly this text.
    Exact(String),
}

impl PatternSegment {
    fn from_option<T: ToString>(value: Option<T>) -> Self {
        value.map_or(Self::Any, |v| Self::Exact(v.to_string()))
    }

    /// The literal value plus the sentinel used by keys that aggregate over
    /// this dimension, or just `Any` when unconstrained.
    fn covering<T: ToString>(value: Option<T>, sentinel: &str) -> Vec<Self> {
        match value {
            Some(v) => vec![Self::Exact(v.to_string()), Self::Exact(sentinel.to_string())],
            None => vec![Self::Any],
        }
    }
}

impl fmt::Display for PatternSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str(WILDCARD),
            Self::Exact(v) => f.write_str(v),
        }
    }
}

/// Threshold-agnostic pattern over the date, branch and currency segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvalidationPattern {
    as_of_date: PatternSegment,
    branch_id: PatternSegment,
    currency: PatternSegment,
}

impl InvalidationPattern {
    /// Pattern that constrains each supplied dimension to its literal value.
    pub fn new(
        branch_id: Option<BranchId>,
        as_of_date: Option<AsOfDate>,
        currency: Option<&CurrencyCode>,
    ) -> Self {
        Self {
            as_of_date: PatternSegment::from_option(as_of_date),
            branch_id: PatternSegment::from_option(branch_id),
            currency: PatternSegment::from_option(currency),
        }
    }

    /// Pattern matching every key.
    pub fn any() -> Self {
        Self::new(None, None, None)
    }

    /// Build a pattern from explicit segments.
    pub fn from_segments(
        as_of_date: PatternSegment,
        branch_id: PatternSegment,
        currency: PatternSegment,
    ) -> Self {
        Self {
            as_of_date,
            branch_id,
            currency,
        }
    }

    /// Every pattern needed to evict summaries that can include rows of the
    /// given branch / date / currency.
    ///
    /// Summaries requested without a date are keyed `latest`, and summaries
    /// requested without a branch or currency are keyed `all`; a change to a
    /// concrete snapshot can alter those too, so for each supplied dimension
    /// both the literal value and the sentinel are covered.
    pub fn covering(
        branch_id: Option<BranchId>,
        as_of_date: Option<AsOfDate>,
        currency: Option<&CurrencyCode>,
    ) -> Vec<Self> {
        let dates = PatternSegment::covering(as_of_date, LATEST);
        let branches = PatternSegment::covering(branch_id, ALL);
        let currencies = PatternSegment::covering(currency, ALL);

        let mut patterns = Vec::with_capacity(dates.len() * branches.len() * currencies.len());
        for date in &dates {
            for branch in &branches {
                for currency in &currencies {
                    patterns.push(Self::from_segments(
                        date.clone(),
                        branch.clone(),
                        currency.clone(),
                    ));
                }
            }
        }
        patterns
    }

    /// Encode to the string form understood by the matcher.
    ///
    /// The trailing separator leaves the threshold position empty; the
    /// matcher never compares that position.
    pub fn encode(&self) -> String {
        format!(
            "{ns}{sep}{date}{sep}{branch}{sep}{currency}{sep}",
            ns = NAMESPACE,
            sep = SEPARATOR,
            date = self.as_of_date,
            branch = self.branch_id,
            currency = self.currency,
        )
    }

    /// Literal prefix shared by every key this pattern can match.
    ///
    /// The namespace plus each leading exact segment, stopping at the first
    /// wildcard. Backends list keys under this prefix before matching.
    pub fn scan_prefix(&self) -> String {
        let mut prefix = namespace_prefix();
        for segment in [&self.as_of_date, &self.branch_id, &self.currency] {
            match segment {
                PatternSegment::Exact(value) => {
                    prefix.push_str(value);
                    prefix.push(SEPARATOR);
                }
                PatternSegment::Any => break,
            }
        }
        prefix
    }
}

/// Prefix shared by every threshold summary key.
pub fn namespace_prefix() -> String {
    format!("{}{}", NAMESPACE, SEPARATOR)
}

impl fmt::Display for InvalidationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Encode a cache key from raw request parameters.
pub fn encode_key(
    as_of_date: Option<AsOfDate>,
    branch_id: Option<BranchId>,
    currency: Option<&CurrencyCode>,
    threshold: Decimal,
) -> String {
    SummaryCacheKey::new(as_of_date, branch_id, currency.cloned(), threshold).encode()
}

/// Encode an invalidation pattern; `None` dimensions become wildcards.
pub fn encode_pattern(
    branch_id: Option<BranchId>,
    as_of_date: Option<AsOfDate>,
    currency: Option<&CurrencyCode>,
) -> String {
    InvalidationPattern::new(branch_id, as_of_date, currency).encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn date() -> AsOfDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    fn usd() -> CurrencyCode {
        CurrencyCode::new("USD").unwrap()
    }

    #[test]
    fn test_key_with_all_filters() {
        let branch = Uuid::nil();
        let key = encode_key(Some(date()), Some(branch), Some(&usd()), Decimal::from(2_000_000));
        assert_eq!(
            key,
            "ecl_threshold_summary:2024-12-31:00000000-0000-0000-0000-000000000000:USD:2000000.0000"
        );
    }

    #[test]
    fn test_key_uses_sentinels_when_absent() {
        let key = encode_key(None, None, None, Decimal::new(15, 1));
        assert_eq!(key, "ecl_threshold_summary:latest:all:all:1.5000");
    }

    #[test]
    fn test_threshold_rounds_half_away_from_zero() {
        assert_eq!(format_threshold(Decimal::new(123_455, 5)), "1.2346");
        assert_eq!(format_threshold(Decimal::new(123_454, 5)), "1.2345");
        assert_eq!(format_threshold(Decimal::from(100)), "100.0000");
    }

    #[test]
    fn test_key_is_deterministic() {
        let branch = Uuid::now_v7();
        let a = encode_key(Some(date()), Some(branch), Some(&usd()), Decimal::from(100));
        let b = encode_key(Some(date()), Some(branch), Some(&usd()), Decimal::from(100));
        assert_eq!(a, b);
    }

    #[test]
    fn test_equal_thresholds_with_different_scale_share_a_key() {
        let a = encode_key(None, None, None, Decimal::new(100, 0));
        let b = encode_key(None, None, None, Decimal::new(10_000, 2));
        assert_eq!(a, b);
    }

    #[test]
    fn test_thresholds_one_ten_thousandth_apart_get_distinct_keys() {
        let a = encode_key(None, None, None, Decimal::from(100));
        let b = encode_key(None, None, None, Decimal::new(1_000_001, 4));
        assert_ne!(a, b);
        assert!(b.ends_with(":100.0001"));
    }

    #[test]
    fn test_pattern_encoding() {
        let branch = Uuid::nil();
        assert_eq!(
            encode_pattern(Some(branch), None, None),
            "ecl_threshold_summary:*:00000000-0000-0000-0000-000000000000:*:"
        );
        assert_eq!(
            encode_pattern(None, Some(date()), Some(&usd())),
            "ecl_threshold_summary:2024-12-31:*:USD:"
        );
        assert_eq!(InvalidationPattern::any().encode(), "ecl_threshold_summary:*:*:*:");
    }

    #[test]
    fn test_scan_prefix_stops_at_first_wildcard() {
        let branch = Uuid::nil();
        assert_eq!(InvalidationPattern::any().scan_prefix(), "ecl_threshold_summary:");
        assert_eq!(
            InvalidationPattern::new(Some(branch), None, None).scan_prefix(),
            "ecl_threshold_summary:"
        );
        assert_eq!(
            InvalidationPattern::new(Some(branch), Some(date()), None).scan_prefix(),
            "ecl_threshold_summary:2024-12-31:00000000-0000-0000-0000-000000000000:"
        );
        assert_eq!(
            InvalidationPattern::new(Some(branch), Some(date()), Some(&usd())).scan_prefix(),
            "ecl_threshold_summary:2024-12-31:00000000-0000-0000-0000-000000000000:USD:"
        );
    }

    #[test]
    fn test_covering_expands_sentinels() {
        let branch = Uuid::nil();
        let patterns = InvalidationPattern::covering(Some(branch), Some(date()), Some(&usd()));
        assert_eq!(patterns.len(), 8);

        let encoded: Vec<String> = patterns.iter().map(|p| p.encode()).collect();
        assert!(encoded.contains(&encode_pattern(Some(branch), Some(date()), Some(&usd()))));
        assert!(encoded.contains(&"ecl_threshold_summary:latest:all:all:".to_string()));
    }

    #[test]
    fn test_covering_with_unconstrained_dimensions() {
        let patterns = InvalidationPattern::covering(None, None, None);
        assert_eq!(patterns, vec![InvalidationPattern::any()]);

        let patterns = InvalidationPattern::covering(Some(Uuid::nil()), None, None);
        assert_eq!(patterns.len(), 2);
    }
}
