//! Business-date helpers
//!
//! The upstream system keys appraisal data by business day and builds natural
//! keys from compact date strings; these helpers cover both.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// True for Monday through Friday. Exchange holidays are not modeled; the
/// upstream appraisal feed itself skips holiday rows.
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The closest business day strictly before `date`.
pub fn previous_business_day(date: NaiveDate) -> NaiveDate {
    let mut prev = date - Days::new(1);
    while !is_business_day(prev) {
        prev = prev - Days::new(1);
    }
    prev
}

/// Renders a date as `YYYYMMDD` for composite natural keys.
pub fn compact_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_previous_business_day_skips_weekend() {
        // 2024-06-10 is a Monday
        assert_eq!(previous_business_day(d(2024, 6, 10)), d(2024, 6, 7));
        // Mid-week is just the prior day
        assert_eq!(previous_business_day(d(2024, 6, 12)), d(2024, 6, 11));
        // Sunday falls back to Friday
        assert_eq!(previous_business_day(d(2024, 6, 9)), d(2024, 6, 7));
    }

    #[test]
    fn test_compact_date() {
        assert_eq!(compact_date(d(2024, 1, 5)), "20240105");
    }
}
