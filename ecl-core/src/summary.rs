//! Threshold summary buckets and the classification that produces them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::exposure::CustomerExposureTotal;

/// Customer count and summed amortized cost for one impairment category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ImpairmentBucket {
    pub customer_count: u64,
    #[cfg_attr(feature = "openapi", schema(value_type = String, example = "2100000.00"))]
    pub amortized_cost: Decimal,
}

impl ImpairmentBucket {
    fn add(&mut self, amount: Decimal) {
        self.customer_count += 1;
        self.amortized_cost += amount;
    }
}

/// Individual / collective impairment split for one filter combination.
///
/// `grand_total` always equals `individual + collective` on both the
/// customer count and the amortized cost. Values are never mutated after
/// [`classify`] builds them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ThresholdSummary {
    pub individual: ImpairmentBucket,
    pub collective: ImpairmentBucket,
    pub grand_total: ImpairmentBucket,
}

impl ThresholdSummary {
    /// Summary with every bucket at zero, returned when no rows match.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if the grand total matches the sum of the two buckets.
    pub fn is_consistent(&self) -> bool {
        self.grand_total.customer_count
            == self.individual.customer_count + self.collective.customer_count
            && self.grand_total.amortized_cost
                == self.individual.amortized_cost + self.collective.amortized_cost
    }
}

/// Classify per-customer totals against the individual significance threshold.
///
/// A customer whose total is greater than or equal to `threshold` is assessed
/// individually; anything strictly below it is assessed collectively.
pub fn classify(totals: &[CustomerExposureTotal], threshold: Decimal) -> ThresholdSummary {
    let mut summary = ThresholdSummary::empty();

    for total in totals {
        if total.total_exposure >= threshold {
            summary.individual.add(total.total_exposure);
        } else {
            summary.collective.add(total.total_exposure);
        }
        summary.grand_total.add(total.total_exposure);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn total(id: &str, amount: i64) -> CustomerExposureTotal {
        CustomerExposureTotal::new(id, Decimal::from(amount))
    }

    #[test]
    fn test_reference_scenario() {
        let totals = vec![
            total("C1", 2_100_000),
            total("C2", 1_900_000),
            total("C3", 500_000),
        ];
        let summary = classify(&totals, Decimal::from(2_000_000));

        assert_eq!(summary.individual.customer_count, 1);
        assert_eq!(summary.individual.amortized_cost, Decimal::from(2_100_000));
        assert_eq!(summary.collective.customer_count, 2);
        assert_eq!(summary.collective.amortized_cost, Decimal::from(2_400_000));
        assert_eq!(summary.grand_total.customer_count, 3);
        assert_eq!(summary.grand_total.amortized_cost, Decimal::from(4_500_000));
    }

    #[test]
    fn test_exact_threshold_is_individual() {
        let summary = classify(&[total("C1", 1_000)], Decimal::from(1_000));
        assert_eq!(summary.individual.customer_count, 1);
        assert_eq!(summary.collective.customer_count, 0);
    }

    #[test]
    fn test_just_below_threshold_is_collective() {
        let totals = [CustomerExposureTotal::new("C1", Decimal::new(99_999, 2))];
        let summary = classify(&totals, Decimal::from(1_000));
        assert_eq!(summary.individual.customer_count, 0);
        assert_eq!(summary.collective.customer_count, 1);
    }

    #[test]
    fn test_empty_input_yields_zero_buckets() {
        let summary = classify(&[], Decimal::ONE);
        assert_eq!(summary, ThresholdSummary::empty());
        assert!(summary.is_consistent());
    }

    #[test]
    fn test_serializes_camel_case() {
        let summary = classify(&[total("C1", 5)], Decimal::ONE);
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["grandTotal"]["customerCount"], 1);
        assert!(json["individual"].get("amortizedCost").is_some());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn totals_strategy() -> impl Strategy<Value = Vec<CustomerExposureTotal>> {
        prop::collection::vec(
            (0i64..10_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2)),
            0..64,
        )
        .prop_map(|amounts| {
            amounts
                .into_iter()
                .enumerate()
                .map(|(i, amount)| CustomerExposureTotal::new(format!("C{}", i), amount))
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Property: the grand total is the sum of the individual and
        /// collective buckets, for counts and amounts alike.
        #[test]
        fn prop_buckets_sum_to_grand_total(
            totals in totals_strategy(),
            threshold_cents in 1i64..10_000_000_000i64,
        ) {
            let summary = classify(&totals, Decimal::new(threshold_cents, 2));
            prop_assert!(summary.is_consistent());
            prop_assert_eq!(summary.grand_total.customer_count, totals.len() as u64);
        }

        /// Property: every individual customer is at or above the threshold.
        #[test]
        fn prop_individual_count_matches_threshold_rule(
            totals in totals_strategy(),
            threshold_cents in 1i64..10_000_000_000i64,
        ) {
            let threshold = Decimal::new(threshold_cents, 2);
            let summary = classify(&totals, threshold);
            let expected = totals.iter().filter(|t| t.total_exposure >= threshold).count() as u64;
            prop_assert_eq!(summary.individual.customer_count, expected);
        }
    }
}
