//! Use-date and lifecycle derivation.
//!
//! A code's validity window only ever widens from unset to set: each bound is
//! written by the first caller that has a value for it and is never changed
//! afterwards. The same rule applies to the expiry window given to codes that
//! disappear from a refreshed source feed.

use chrono::{Months, NaiveDate, NaiveDateTime};

use crate::types::{fill_if_empty, Code, Deprecation, STATUS_DEPRECATED};

/// Format of every persisted date.
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Source status that opens a code's window.
pub const SOURCE_STATUS_ACTIVE: &str = "Active";
/// Source status that closes a code's window.
pub const SOURCE_STATUS_INACTIVE: &str = "Inactive";

/// Months from processing until a vanished code starts warning.
pub const EXPIRY_WARN_MONTHS: u32 = 6;
/// Months from processing until a vanished code stops being valid.
pub const EXPIRY_END_MONTHS: u32 = 12;

/// Format a date as `yyyyMMdd`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a feed date written `M/d/yyyy`.
pub fn parse_feed_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(text, "%m/%d/%Y").ok()
}

/// Parse a processing date written `yyyyMMdd` or `yyyy-MM-dd`.
pub fn parse_as_of(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .ok()
}

/// Parse a last-updated timestamp (`yyyy-MM-dd HH:mm:ss` or `yyyy-MM-dd`).
pub fn parse_timestamp(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .ok()
}

/// True for an 8-character `yyyyMMdd` candidate.
pub fn is_compact_date(text: &str) -> bool {
    text.len() == 8
}

/// Derive a window bound from a source status.
///
/// `Active` fills `notBefore`, `Inactive` fills `notAfter`, both with
/// `as_of`. Any other status, or no date, leaves the window alone. Returns
/// `true` when a bound was written.
pub fn apply_status_date(code: &mut Code, status: &str, as_of: Option<NaiveDate>) -> bool {
    let Some(as_of) = as_of else {
        return false;
    };
    match status {
        SOURCE_STATUS_ACTIVE => fill_if_empty(&mut code.use_date.not_before, &format_date(as_of)),
        SOURCE_STATUS_INACTIVE => fill_if_empty(&mut code.use_date.not_after, &format_date(as_of)),
        _ => false,
    }
}

/// Fill `notBefore` from a `yyyyMMdd` string. Other lengths are ignored.
pub fn fill_not_before(code: &mut Code, date: &str) -> bool {
    is_compact_date(date) && fill_if_empty(&mut code.use_date.not_before, date)
}

/// Fill `notAfter` from a `yyyyMMdd` string. Other lengths are ignored.
pub fn fill_not_after(code: &mut Code, date: &str) -> bool {
    is_compact_date(date) && fill_if_empty(&mut code.use_date.not_after, date)
}

/// Warning and end dates given to codes dropped from a source feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryWindow {
    /// Becomes `notExpectedAfter`.
    pub warn: NaiveDate,
    /// Becomes `notAfter`.
    pub expire: NaiveDate,
}

impl ExpiryWindow {
    /// Six and twelve months after `processed_on`.
    pub fn from_processing_date(processed_on: NaiveDate) -> Self {
        let add = |months| {
            processed_on
                .checked_add_months(Months::new(months))
                .unwrap_or(NaiveDate::MAX)
        };
        Self {
            warn: add(EXPIRY_WARN_MONTHS),
            expire: add(EXPIRY_END_MONTHS),
        }
    }
}

/// Give a vanished code its expiry window. Each bound is only filled if
/// unset. Returns `true` when anything was written.
pub fn mark_expiring(code: &mut Code, window: ExpiryWindow) -> bool {
    let warned = fill_if_empty(&mut code.use_date.not_expected_after, &format_date(window.warn));
    let expired = fill_if_empty(&mut code.use_date.not_after, &format_date(window.expire));
    warned || expired
}

/// Turn a freshly created alias code into a deprecated pointer to its
/// canonical value.
pub fn deprecate_alias(
    code: &mut Code,
    canonical_value: &str,
    effective: Option<NaiveDate>,
    reason: &str,
) {
    code.code_status.status = Some(STATUS_DEPRECATED.to_string());
    code.code_status.deprecated = Some(Deprecation {
        effective_date: effective.map(format_date),
        new_code_value: Some(canonical_value.to_string()),
        reason: Some(reason.to_string()),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_active_sets_not_before() {
        let mut code = Code::new("208");
        assert!(apply_status_date(&mut code, "Active", Some(date(2020, 12, 14))));
        assert_eq!(code.use_date.not_before.as_deref(), Some("20201214"));
        assert_eq!(code.use_date.not_after, None);
    }

    #[test]
    fn test_active_then_inactive_keeps_both() {
        let mut code = Code::new("208");
        apply_status_date(&mut code, "Active", Some(date(2020, 12, 14)));
        assert!(apply_status_date(&mut code, "Inactive", Some(date(2023, 9, 11))));
        assert!(!apply_status_date(&mut code, "Active", Some(date(2024, 1, 1))));
        assert!(!apply_status_date(&mut code, "Inactive", Some(date(2024, 1, 1))));
        assert_eq!(code.use_date.not_before.as_deref(), Some("20201214"));
        assert_eq!(code.use_date.not_after.as_deref(), Some("20230911"));
    }

    #[test]
    fn test_other_status_or_no_date_is_noop() {
        let mut code = Code::new("213");
        assert!(!apply_status_date(&mut code, "Pending", Some(date(2021, 1, 1))));
        assert!(!apply_status_date(&mut code, "Active", None));
        assert!(code.use_date.is_empty());
    }

    #[test]
    fn test_compact_date_fill() {
        let mut code = Code::new("x");
        assert!(!fill_not_before(&mut code, "2020-01-01"));
        assert!(fill_not_before(&mut code, "20200101"));
        assert!(!fill_not_before(&mut code, "20210101"));
        assert!(fill_not_after(&mut code, "20300101"));
        assert_eq!(code.use_date.not_before.as_deref(), Some("20200101"));
        assert_eq!(code.use_date.not_after.as_deref(), Some("20300101"));
    }

    #[test]
    fn test_expiry_window() {
        let window = ExpiryWindow::from_processing_date(date(2024, 8, 31));
        assert_eq!(window.warn, date(2025, 2, 28));
        assert_eq!(window.expire, date(2025, 8, 31));
    }

    #[test]
    fn test_mark_expiring_only_fills() {
        let window = ExpiryWindow::from_processing_date(date(2024, 1, 15));
        let mut code = Code::new("49281-0215-88");
        code.use_date.not_after = Some("20240301".to_string());

        assert!(mark_expiring(&mut code, window));
        assert_eq!(code.use_date.not_expected_after.as_deref(), Some("20240715"));
        assert_eq!(code.use_date.not_after.as_deref(), Some("20240301"));
        assert!(!mark_expiring(&mut code, window));
    }

    #[test]
    fn test_parsers() {
        assert_eq!(parse_feed_date("12/14/2020"), Some(date(2020, 12, 14)));
        assert_eq!(parse_feed_date("3/5/2021"), Some(date(2021, 3, 5)));
        assert_eq!(parse_feed_date("not a date"), None);
        assert_eq!(parse_feed_date(""), None);
        assert_eq!(parse_timestamp("2021-06-02 10:15:00"), Some(date(2021, 6, 2)));
        assert_eq!(parse_timestamp("2021-06-02"), Some(date(2021, 6, 2)));
        assert_eq!(parse_timestamp("06/02/2021"), None);
        assert_eq!(parse_as_of("20240115"), Some(date(2024, 1, 15)));
        assert_eq!(parse_as_of("2024-01-15"), Some(date(2024, 1, 15)));
    }

    #[test]
    fn test_deprecate_alias() {
        let mut code = Code::new("5916008201");
        deprecate_alias(&mut code, "59160-0820-11", Some(date(2019, 5, 1)), "Use 11-digit format with dashes");
        assert_eq!(code.status(), Some("Deprecated"));
        let deprecation = code.code_status.deprecated.as_ref().unwrap();
        assert_eq!(deprecation.effective_date.as_deref(), Some("20190501"));
        assert_eq!(deprecation.new_code_value.as_deref(), Some("59160-0820-11"));
        assert!(!code.is_active());
    }
}
