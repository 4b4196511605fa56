//! Enumeration prefix generation.
//!
//! Listing the whole export bucket is wasteful when the caller only wants
//! a date window, so enumeration is driven by key prefixes of the form
//! `v1/account_id=<id>/type=<family>[/date=<YYYY>-<MM>-<DD>]` — the date
//! segment is only as deep as the caller supplies, allowing progressively
//! broader listings.

use chrono::{Days, NaiveDate};

/// Table families exported by the vendor.
pub const DEFAULT_TABLE_FAMILIES: &[&str] = &["decisions", "events"];

/// An inclusive calendar day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// First day, inclusive.
    pub start: NaiveDate,
    /// Last day, inclusive.
    pub end: NaiveDate,
}

impl DateRange {
    /// Iterates every calendar day from `start` through `end` inclusive,
    /// in chronological order. Empty when `start > end`.
    pub fn days(self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        let mut current = Some(self.start);
        std::iter::from_fn(move || {
            let day = current?;
            if day > end {
                return None;
            }
            current = day.checked_add_days(Days::new(1));
            Some(day)
        })
    }
}

/// Builds the prefix covering every day of one table family.
#[must_use]
pub fn family_prefix(account_id: &str, family: &str) -> String {
    format!("v1/account_id={account_id}/type={family}")
}

/// Builds the prefix for one table family on one calendar day.
#[must_use]
pub fn day_prefix(account_id: &str, family: &str, day: NaiveDate) -> String {
    format!(
        "{}/date={}",
        family_prefix(account_id, family),
        day.format("%Y-%m-%d")
    )
}

/// Produces the ordered sequence of enumeration prefixes for an account.
///
/// With a range: one prefix per `(day, family)` pair, days in chronological
/// order with both endpoints included, families in the given order within
/// each day. Without a range: one prefix per family, scoped only to the
/// account.
#[must_use]
pub fn enumeration_prefixes(
    account_id: &str,
    families: &[String],
    range: Option<&DateRange>,
) -> Vec<String> {
    match range {
        Some(range) => range
            .days()
            .flat_map(|day| {
                families
                    .iter()
                    .map(move |family| day_prefix(account_id, family, day))
            })
            .collect(),
        None => families
            .iter()
            .map(|family| family_prefix(account_id, family))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn families() -> Vec<String> {
        DEFAULT_TABLE_FAMILIES
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn covers_month_rollover_inclusively() {
        let range = DateRange {
            start: date(2023, 1, 30),
            end: date(2023, 2, 2),
        };
        let prefixes = enumeration_prefixes("123", &families(), Some(&range));

        // 4 days x 2 families, chronological, no skipped or duplicated day.
        assert_eq!(prefixes.len(), 8);
        assert_eq!(prefixes[0], "v1/account_id=123/type=decisions/date=2023-01-30");
        assert_eq!(prefixes[1], "v1/account_id=123/type=events/date=2023-01-30");
        assert_eq!(prefixes[2], "v1/account_id=123/type=decisions/date=2023-01-31");
        assert_eq!(prefixes[4], "v1/account_id=123/type=decisions/date=2023-02-01");
        assert_eq!(prefixes[6], "v1/account_id=123/type=decisions/date=2023-02-02");
        assert_eq!(prefixes[7], "v1/account_id=123/type=events/date=2023-02-02");
    }

    #[test]
    fn single_day_range_yields_one_prefix_per_family() {
        let range = DateRange {
            start: date(2024, 6, 1),
            end: date(2024, 6, 1),
        };
        let prefixes = enumeration_prefixes("9", &families(), Some(&range));
        assert_eq!(
            prefixes,
            vec![
                "v1/account_id=9/type=decisions/date=2024-06-01",
                "v1/account_id=9/type=events/date=2024-06-01",
            ]
        );
    }

    #[test]
    fn inverted_range_yields_nothing() {
        let range = DateRange {
            start: date(2024, 6, 2),
            end: date(2024, 6, 1),
        };
        assert!(enumeration_prefixes("9", &families(), Some(&range)).is_empty());
    }

    #[test]
    fn no_range_scopes_to_account_only() {
        let prefixes = enumeration_prefixes("42", &families(), None);
        assert_eq!(
            prefixes,
            vec![
                "v1/account_id=42/type=decisions",
                "v1/account_id=42/type=events",
            ]
        );
    }

    #[test]
    fn leap_day_is_enumerated() {
        let range = DateRange {
            start: date(2024, 2, 28),
            end: date(2024, 3, 1),
        };
        let prefixes =
            enumeration_prefixes("1", &["events".to_string()], Some(&range));
        assert_eq!(
            prefixes,
            vec![
                "v1/account_id=1/type=events/date=2024-02-28",
                "v1/account_id=1/type=events/date=2024-02-29",
                "v1/account_id=1/type=events/date=2024-03-01",
            ]
        );
    }
}
