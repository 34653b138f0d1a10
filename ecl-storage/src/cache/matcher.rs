//! Segment matcher for invalidation patterns.

use super::key::{SEPARATOR, WILDCARD};

/// Returns true if `key` is selected by `pattern`.
///
/// Both strings are split on the key separator. A pattern with more segments
/// than the key never matches. Otherwise every pattern segment except the
/// last must be the wildcard or equal to the key segment at the same
/// position. The last pattern segment sits in the threshold position, which
/// is never compared, so a pattern always covers every threshold variant.
pub fn matches_pattern(key: &str, pattern: &str) -> bool {
    let key_parts: Vec<&str> = key.split(SEPARATOR).collect();
    let pattern_parts: Vec<&str> = pattern.split(SEPARATOR).collect();

    if pattern_parts.len() > key_parts.len() {
        return false;
    }

    let compared = pattern_parts.len().saturating_sub(1);
    pattern_parts[..compared]
        .iter()
        .zip(&key_parts)
        .all(|(p, k)| *p == WILDCARD || p == k)
}

/// Keys from `keys` selected by `pattern`, in iteration order.
pub fn select_matching<'a, I>(keys: I, pattern: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    keys.into_iter()
        .filter(|k| matches_pattern(k, pattern))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::{encode_key, encode_pattern};
    use chrono::NaiveDate;
    use ecl_core::{AsOfDate, CurrencyCode};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn date(day: u32) -> AsOfDate {
        NaiveDate::from_ymd_opt(2024, 12, day).unwrap()
    }

    fn ccy(code: &str) -> CurrencyCode {
        CurrencyCode::new(code).unwrap()
    }

    #[test]
    fn test_literal_segments() {
        assert!(matches_pattern("ns:2024-12-31:B:USD:100.0000", "ns:2024-12-31:B:USD:"));
        assert!(!matches_pattern("ns:2024-12-31:B:EUR:100.0000", "ns:2024-12-31:B:USD:"));
    }

    #[test]
    fn test_wildcards_match_anything() {
        assert!(matches_pattern("ns:latest:all:all:1.0000", "ns:*:*:*:"));
        assert!(matches_pattern("ns:2024-12-31:B:USD:1.0000", "ns:*:B:*:"));
        assert!(!matches_pattern("ns:2024-12-31:C:USD:1.0000", "ns:*:B:*:"));
    }

    #[test]
    fn test_longer_pattern_never_matches() {
        assert!(!matches_pattern("ns:a:b", "ns:a:b:c:"));
    }

    #[test]
    fn test_threshold_position_is_ignored() {
        assert!(matches_pattern("ns:d:b:c:100.0000", "ns:d:b:c:200.0000"));
    }

    #[test]
    fn test_branch_pattern_selects_every_variant() {
        let branch_b = Uuid::now_v7();
        let branch_c = Uuid::now_v7();

        let keys = vec![
            encode_key(Some(date(31)), Some(branch_b), Some(&ccy("USD")), Decimal::from(100)),
            encode_key(Some(date(30)), Some(branch_b), Some(&ccy("EUR")), Decimal::from(200)),
            encode_key(None, Some(branch_b), None, Decimal::from(300)),
            encode_key(Some(date(31)), Some(branch_c), Some(&ccy("USD")), Decimal::from(100)),
            encode_key(None, None, None, Decimal::from(100)),
        ];

        let pattern = encode_pattern(Some(branch_b), None, None);
        let selected = select_matching(&keys, &pattern);

        assert_eq!(selected.len(), 3);
        assert!(selected.iter().all(|k| k.contains(&branch_b.to_string())));
    }

    #[test]
    fn test_date_and_currency_pattern() {
        let branch = Uuid::now_v7();
        let keys = vec![
            encode_key(Some(date(31)), Some(branch), Some(&ccy("USD")), Decimal::from(1)),
            encode_key(Some(date(31)), None, Some(&ccy("USD")), Decimal::from(1)),
            encode_key(Some(date(31)), Some(branch), Some(&ccy("EUR")), Decimal::from(1)),
            encode_key(Some(date(30)), Some(branch), Some(&ccy("USD")), Decimal::from(1)),
        ];

        let pattern = encode_pattern(None, Some(date(31)), Some(&ccy("USD")));
        assert_eq!(select_matching(&keys, &pattern).len(), 2);
    }

    #[test]
    fn test_empty_registry() {
        let keys: Vec<String> = Vec::new();
        assert!(select_matching(&keys, "ns:*:*:*:").is_empty());
    }
}
