//! Time helpers for reporting windows and display formats.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};

/// A timestamp (always UTC at rest).
pub type Timestamp = DateTime<Utc>;

/// Display offset in seconds east of UTC (UTC+8).
pub const DISPLAY_OFFSET_SECS: i32 = 8 * 3600;

fn to_display(t: Timestamp) -> DateTime<FixedOffset> {
    match FixedOffset::east_opt(DISPLAY_OFFSET_SECS) {
        Some(offset) => t.with_timezone(&offset),
        None => t.fixed_offset(),
    }
}

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Parse a `YYYY-MM-DD` date; empty or malformed input yields `None`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// First and last day of the month containing `t`.
pub fn month_bounds(t: Timestamp) -> (NaiveDate, NaiveDate) {
    let date = t.date_naive();
    let first = date.with_day(1).unwrap_or(date);
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month
        .map(|d| d - Duration::days(1))
        .unwrap_or(first);
    (first, last)
}

/// Verbose display format, e.g. `2024-03-01T09:30:00+08:00`.
pub fn format_verbose(t: Timestamp) -> String {
    to_display(t).format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Date-only display format.
pub fn format_date(t: Timestamp) -> String {
    to_display(t).format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-02-29"), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("29/02/2024"), None);
    }

    #[test]
    fn test_month_bounds() {
        let t = Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap();
        let (first, last) = month_bounds(t);
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let t = Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0).unwrap();
        let (_, last) = month_bounds(t);
        assert_eq!(last, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn test_format_verbose() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 1, 30, 0).unwrap();
        assert_eq!(format_verbose(t), "2024-03-01T09:30:00+08:00");
        assert_eq!(format_date(t), "2024-03-01");
    }
}
