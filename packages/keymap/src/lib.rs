#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Key translation and enumeration prefix generation.
//!
//! The vendor export bucket addresses objects as
//!
//! ```text
//! v1/account_id=<id>/type=<table>/date=<YYYY>-<MM>-<DD>/<partition>=<value>/<file>
//! ```
//!
//! Query engines prune partitions by key prefix, so the destination layout
//! moves the low-cardinality columns ahead of the filename and splits the
//! date into separate segments:
//!
//! ```text
//! <table>/account=<id>/<partition>=<value>/year=<YYYY>/month=<MM>/day=<DD>/<file>
//! ```
//!
//! [`KeyPattern::translate`] performs that rewrite. It is a pure function:
//! the same source key always yields the same destination key, which is
//! what makes the transfer worker's exists-before-write guard sound.

pub mod prefix;

pub use prefix::{DEFAULT_TABLE_FAMILIES, DateRange, enumeration_prefixes, family_prefix};

use regex::Regex;

/// Structural grammar of a data object key in the vendor export bucket.
///
/// Capture groups: account id, table type, year, month, day, partition
/// column, partition value, and the remainder (filename).
const SOURCE_KEY_PATTERN: &str = r"^v1/account_id=([0-9]+)/type=([a-z]+)/date=([0-9]{4})-([0-9]{2})-([0-9]{2})/([a-z]+)=([A-Za-z0-9_]+)/(.+)$";

/// Outcome of translating one source key.
///
/// Non-matching keys are expected (marker objects, unrelated uploads) and
/// are never treated as errors — callers branch on the variant and count
/// skips instead of raising.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// The key matched the grammar; here is its destination key.
    Matched(String),
    /// The key does not address a data object in the export layout.
    NotApplicable,
    /// The key matched the grammar but carries an impossible calendar
    /// date (e.g. month 13).
    Invalid {
        /// Description of the rejected component.
        reason: String,
    },
}

/// Compiled source-key grammar.
///
/// Construct once at startup and pass a reference into every call site —
/// the pattern is immutable configuration, not global state.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    re: Regex,
}

impl Default for KeyPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyPattern {
    /// Compiles the source-key grammar.
    #[must_use]
    pub fn new() -> Self {
        Self {
            re: Regex::new(SOURCE_KEY_PATTERN).unwrap_or_else(|_| unreachable!()),
        }
    }

    /// Translates a source key into its destination key.
    ///
    /// Returns [`Translation::NotApplicable`] for keys outside the export
    /// grammar and [`Translation::Invalid`] for keys whose date component
    /// is not a real calendar date. Deterministic: equal inputs always
    /// produce equal outputs.
    #[must_use]
    pub fn translate(&self, source_key: &str) -> Translation {
        let Some(caps) = self.re.captures(source_key) else {
            return Translation::NotApplicable;
        };

        let account_id = &caps[1];
        let table = &caps[2];
        let (year, month, day) = (&caps[3], &caps[4], &caps[5]);
        let partition_key = &caps[6];
        let partition_value = &caps[7];
        let rest = &caps[8];

        if !is_real_date(year, month, day) {
            return Translation::Invalid {
                reason: format!("impossible date {year}-{month}-{day}"),
            };
        }

        Translation::Matched(format!(
            "{table}/account={account_id}/{partition_key}={partition_value}/year={year}/month={month}/day={day}/{rest}"
        ))
    }
}

/// Checks that zero-padded date components form a real calendar date.
fn is_real_date(year: &str, month: &str, day: &str) -> bool {
    let (Ok(y), Ok(m), Ok(d)) = (
        year.parse::<i32>(),
        month.parse::<u32>(),
        day.parse::<u32>(),
    ) else {
        return false;
    };
    chrono::NaiveDate::from_ymd_opt(y, m, d).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(key: &str) -> Translation {
        KeyPattern::new().translate(key)
    }

    #[test]
    fn rewrites_data_key_into_partition_pruned_layout() {
        let result = translate("v1/account_id=123/type=events/date=2024-01-05/event=click/part-0.parquet");
        assert_eq!(
            result,
            Translation::Matched(
                "events/account=123/event=click/year=2024/month=01/day=05/part-0.parquet"
                    .to_string()
            )
        );
    }

    #[test]
    fn rewrites_real_export_key() {
        let result = translate(
            "v1/account_id=21537940595/type=events/date=2024-01-01/event=NULL/part-00000-b5f3005a.c000.snappy.parquet",
        );
        assert_eq!(
            result,
            Translation::Matched(
                "events/account=21537940595/event=NULL/year=2024/month=01/day=01/part-00000-b5f3005a.c000.snappy.parquet"
                    .to_string()
            )
        );
    }

    #[test]
    fn is_deterministic() {
        let pattern = KeyPattern::new();
        let key = "v1/account_id=7/type=decisions/date=2023-12-31/experiment=exp_1/f.parquet";
        assert_eq!(pattern.translate(key), pattern.translate(key));
    }

    #[test]
    fn distinct_filenames_stay_distinct() {
        let pattern = KeyPattern::new();
        let a = pattern.translate("v1/account_id=1/type=events/date=2024-02-02/event=x/a.parquet");
        let b = pattern.translate("v1/account_id=1/type=events/date=2024-02-02/event=x/b.parquet");
        assert_ne!(a, b);
    }

    #[test]
    fn unrelated_key_is_not_applicable() {
        assert_eq!(translate("random/unrelated/key.txt"), Translation::NotApplicable);
    }

    #[test]
    fn success_marker_is_not_applicable() {
        assert_eq!(
            translate("v1/account_id=123/type=events/date=2024-01-05/_SUCCESS"),
            Translation::NotApplicable
        );
    }

    #[test]
    fn missing_partition_segment_is_not_applicable() {
        assert_eq!(
            translate("v1/account_id=123/type=events/date=2024-01-05/part-0.parquet"),
            Translation::NotApplicable
        );
    }

    #[test]
    fn uppercase_table_type_is_not_applicable() {
        assert_eq!(
            translate("v1/account_id=123/type=Events/date=2024-01-05/event=click/f.parquet"),
            Translation::NotApplicable
        );
    }

    #[test]
    fn impossible_month_is_invalid() {
        let result = translate("v1/account_id=123/type=events/date=2024-13-05/event=click/f.parquet");
        assert!(matches!(result, Translation::Invalid { .. }));
    }

    #[test]
    fn nonexistent_leap_day_is_invalid() {
        let result = translate("v1/account_id=123/type=events/date=2023-02-29/event=click/f.parquet");
        assert!(matches!(result, Translation::Invalid { .. }));
    }

    #[test]
    fn nested_rest_path_is_preserved() {
        let result = translate("v1/account_id=9/type=events/date=2024-06-15/event=view/sub/dir/f.parquet");
        assert_eq!(
            result,
            Translation::Matched(
                "events/account=9/event=view/year=2024/month=06/day=15/sub/dir/f.parquet"
                    .to_string()
            )
        );
    }
}
