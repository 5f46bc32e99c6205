//! Trading-date helpers

use anyhow::{Context, Result};
use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Parse a `YYYY-MM-DD` date string.
///
/// # Errors
///
/// Fails when the string is not a valid calendar date in that shape.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("date must be YYYY-MM-DD: '{s}'"))
}

/// Format a date as `YYYY-MM-DD`.
#[must_use]
pub fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// The next weekday after `d` (Saturdays and Sundays are skipped).
#[must_use]
pub fn next_business_day(d: NaiveDate) -> NaiveDate {
    let mut next = d + Days::new(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next = next + Days::new(1);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats() {
        let d = parse_date("2026-01-02").unwrap();
        assert_eq!(format_date(d), "2026-01-02");
        assert!(parse_date("01/02/2026").is_err());
        assert!(parse_date("2026-13-40").is_err());
    }

    #[test]
    fn weekends_are_skipped() {
        // 2026-01-02 is a Friday.
        let friday = parse_date("2026-01-02").unwrap();
        assert_eq!(format_date(next_business_day(friday)), "2026-01-05");

        let monday = parse_date("2026-01-05").unwrap();
        assert_eq!(format_date(next_business_day(monday)), "2026-01-06");
    }
}
