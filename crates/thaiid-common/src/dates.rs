//! Buddhist-era date handling
//!
//! Thai ID cards store dates as `YYYYMMDD` in the Buddhist calendar
//! (Gregorian year + 543).

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("date field is not 8 digits: {0:?}")]
    Malformed(String),
    #[error("date field is not a valid calendar date: {0:?}")]
    Invalid(String),
}

/// Convert a Buddhist-calendar `YYYYMMDD` string to Gregorian `YYYY-MM-DD`.
///
/// The Buddhist leap day 29 Feb can land on a Gregorian year that is not a
/// leap year; it clamps to 28 Feb rather than failing.
pub fn buddhist_to_gregorian(raw: &str) -> Result<String, DateError> {
    let digits = raw.trim();
    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DateError::Malformed(raw.to_string()));
    }

    // Unwraps are safe: all-ASCII-digit input checked above.
    let year: i32 = digits[..4].parse().unwrap();
    let month: u32 = digits[4..6].parse().unwrap();
    let day: u32 = digits[6..8].parse().unwrap();

    let gregorian_year = year - 543;
    let date = NaiveDate::from_ymd_opt(gregorian_year, month, day)
        .or_else(|| {
            if month == 2 && day == 29 {
                NaiveDate::from_ymd_opt(gregorian_year, 2, 28)
            } else {
                None
            }
        })
        .ok_or_else(|| DateError::Invalid(raw.to_string()))?;

    Ok(date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_buddhist_to_gregorian() {
        assert_eq!(buddhist_to_gregorian("25680115").unwrap(), "2025-01-15");
        assert_eq!(buddhist_to_gregorian("25111231").unwrap(), "1968-12-31");
    }

    #[test]
    fn clamps_leap_day_when_gregorian_year_is_not_leap() {
        // Buddhist 2568 is divisible by four but Gregorian 2025 is not leap.
        assert_eq!(buddhist_to_gregorian("25680229").unwrap(), "2025-02-28");
        // Gregorian 2024 is leap; no clamping needed.
        assert_eq!(buddhist_to_gregorian("25670229").unwrap(), "2024-02-29");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            buddhist_to_gregorian("2568011"),
            Err(DateError::Malformed(_))
        ));
        assert!(matches!(
            buddhist_to_gregorian("2568O115"),
            Err(DateError::Malformed(_))
        ));
        assert!(matches!(
            buddhist_to_gregorian(""),
            Err(DateError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_zero_month_and_day() {
        assert!(matches!(
            buddhist_to_gregorian("25680000"),
            Err(DateError::Invalid(_))
        ));
        assert!(matches!(
            buddhist_to_gregorian("25681301"),
            Err(DateError::Invalid(_))
        ));
    }
}
