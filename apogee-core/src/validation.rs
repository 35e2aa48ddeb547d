//! Input validation shared by the REST and GraphQL surfaces.
//!
//! Everything here runs before any store or upstream access.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ValidationError;

static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static date pattern"));

/// Parse a strict `YYYY-MM-DD` date.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ValidationError> {
    let invalid = || ValidationError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    };
    if !DATE_PATTERN.is_match(value) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())
}

/// Require `start <= end` and, when given, an inclusive span of at most
/// `max_span_days` days.
pub fn validate_range(
    start: NaiveDate,
    end: NaiveDate,
    max_span_days: Option<i64>,
) -> Result<(), ValidationError> {
    if start > end {
        return Err(ValidationError::InvalidRange {
            field: "start_date".to_string(),
            reason: format!("start date {} is after end date {}", start, end),
        });
    }
    if let Some(max) = max_span_days {
        let span = (end - start).num_days();
        if span > max {
            return Err(ValidationError::InvalidRange {
                field: "end_date".to_string(),
                reason: format!("date range spans {} days, at most {} allowed", span, max),
            });
        }
    }
    Ok(())
}

/// Every date from `start` to `end`, inclusive.
pub fn dates_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[test]
    fn test_parse_date_accepts_strict_format() {
        assert_eq!(parse_date("date", "2024-02-29"), Ok(date(2024, 2, 29)));
    }

    #[test]
    fn test_parse_date_rejects_loose_formats() {
        for value in ["2024-2-29", "2024/02/29", "29-02-2024", "", "2024-02-29T00:00:00"] {
            assert!(
                matches!(parse_date("date", value), Err(ValidationError::InvalidDate { .. })),
                "{} should be rejected",
                value
            );
        }
    }

    #[test]
    fn test_parse_date_rejects_impossible_day() {
        assert!(parse_date("date", "2023-02-29").is_err());
    }

    #[test]
    fn test_validate_range() {
        let start = date(2024, 1, 1);
        assert!(validate_range(start, date(2024, 1, 8), Some(7)).is_ok());
        assert!(validate_range(start, date(2024, 1, 9), Some(7)).is_err());
        assert!(validate_range(date(2024, 1, 2), start, None).is_err());
        assert!(validate_range(start, start, Some(0)).is_ok());
    }

    #[test]
    fn test_dates_between_inclusive() {
        let days = dates_between(date(2024, 2, 27), date(2024, 3, 1));
        assert_eq!(days.len(), 4);
        assert_eq!(days.first(), Some(&date(2024, 2, 27)));
        assert_eq!(days.last(), Some(&date(2024, 3, 1)));
        assert!(dates_between(date(2024, 3, 1), date(2024, 2, 1)).is_empty());
    }
}
