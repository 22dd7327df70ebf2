//! Report date/time tokens to epoch seconds
//!
//! Report times are read as naive UTC: no zone or daylight-saving conversion.

use chrono::NaiveDate;
use std::fmt;

/// Date or time token that does not form a calendar instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    /// Expected "YYYY-MM-DD"
    InvalidDate(String),
    /// Expected "HH:MM:SS[.fraction]"
    InvalidTime(String),
    /// Combined value could not be split into date and time
    InvalidDateTime(String),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::InvalidDate(val) => {
                write!(f, "Invalid date: '{}' (expected YYYY-MM-DD)", val)
            }
            TimestampError::InvalidTime(val) => {
                write!(f, "Invalid time: '{}' (expected HH:MM:SS[.fraction])", val)
            }
            TimestampError::InvalidDateTime(val) => {
                write!(f, "Invalid date/time: '{}' (expected 'YYYY-MM-DD HH:MM:SS')", val)
            }
        }
    }
}

impl std::error::Error for TimestampError {}

/// Split "a-b-c" (or "a:b:c") into exactly three trimmed parts
fn three_parts(token: &str, sep: char) -> Option<[&str; 3]> {
    let mut parts = token.trim().split(sep).map(str::trim);
    let parts_array = [parts.next()?, parts.next()?, parts.next()?];
    match parts.next() {
        Some(_) => None,
        None => Some(parts_array),
    }
}

/// Combine a date token and a time token into epoch seconds (UTC)
///
/// Fractional seconds are truncated, never rounded.
///
/// ```
/// # use entsoe_importer::services::timestamp::to_epoch_seconds;
/// assert_eq!(to_epoch_seconds("2021-05-01", "13:45:30.5"), Ok(1_619_876_730));
/// ```
pub fn to_epoch_seconds(date: &str, time: &str) -> Result<i64, TimestampError> {
    let invalid_date = || TimestampError::InvalidDate(date.to_string());
    let invalid_time = || TimestampError::InvalidTime(time.to_string());

    let [y, m, d] = three_parts(date, '-').ok_or_else(invalid_date)?;
    let year: i32 = y.parse().map_err(|_| invalid_date())?;
    let month: u32 = m.parse().map_err(|_| invalid_date())?;
    let day: u32 = d.parse().map_err(|_| invalid_date())?;

    let [h, mi, s] = three_parts(time, ':').ok_or_else(invalid_time)?;
    let hour: u32 = h.parse().map_err(|_| invalid_time())?;
    let minute: u32 = mi.parse().map_err(|_| invalid_time())?;
    let seconds: f64 = s.parse().map_err(|_| invalid_time())?;
    if !seconds.is_finite() || seconds < 0.0 || seconds >= 60.0 {
        return Err(invalid_time());
    }
    let second = seconds.trunc() as u32;

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid_date)?;
    let instant = date.and_hms_opt(hour, minute, second).ok_or_else(invalid_time)?;

    Ok(instant.and_utc().timestamp())
}

/// Parse the combined report column "YYYY-MM-DD HH:MM:SS[.fraction]"
pub fn parse_report_datetime(value: &str) -> Result<i64, TimestampError> {
    let (date, time) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| TimestampError::InvalidDateTime(value.to_string()))?;
    to_epoch_seconds(date, time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_is_truncated() {
        // 2021-05-01T13:45:30Z
        assert_eq!(to_epoch_seconds("2021-05-01", "13:45:30.5"), Ok(1_619_876_730));
        assert_eq!(to_epoch_seconds("2021-05-01", "13:45:30.999"), Ok(1_619_876_730));
    }

    #[test]
    fn test_whole_seconds() {
        assert_eq!(to_epoch_seconds("2021-05-01", "00:00:00"), Ok(1_619_827_200));
        assert_eq!(to_epoch_seconds("1970-01-01", "00:00:00"), Ok(0));
    }

    #[test]
    fn test_report_datetime_column() {
        assert_eq!(parse_report_datetime("2021-05-01 00:00:00.000"), Ok(1_619_827_200));
        assert_eq!(parse_report_datetime(" 2021-05-01 13:45:30.5 "), Ok(1_619_876_730));
    }

    #[test]
    fn test_report_datetime_without_time() {
        assert_eq!(
            parse_report_datetime("2021-05-01"),
            Err(TimestampError::InvalidDateTime("2021-05-01".to_string()))
        );
    }

    #[test]
    fn test_invalid_date_tokens() {
        assert!(matches!(to_epoch_seconds("2021-05", "00:00:00"), Err(TimestampError::InvalidDate(_))));
        assert!(matches!(to_epoch_seconds("2021-13-01", "00:00:00"), Err(TimestampError::InvalidDate(_))));
        assert!(matches!(to_epoch_seconds("2021-02-30", "00:00:00"), Err(TimestampError::InvalidDate(_))));
        assert!(matches!(to_epoch_seconds("01.05.2021", "00:00:00"), Err(TimestampError::InvalidDate(_))));
        assert!(matches!(to_epoch_seconds("2021-05-01-02", "00:00:00"), Err(TimestampError::InvalidDate(_))));
    }

    #[test]
    fn test_invalid_time_tokens() {
        assert!(matches!(to_epoch_seconds("2021-05-01", "24:00:00"), Err(TimestampError::InvalidTime(_))));
        assert!(matches!(to_epoch_seconds("2021-05-01", "12:00"), Err(TimestampError::InvalidTime(_))));
        assert!(matches!(to_epoch_seconds("2021-05-01", "12:xx:00"), Err(TimestampError::InvalidTime(_))));
        assert!(matches!(to_epoch_seconds("2021-05-01", "12:00:60"), Err(TimestampError::InvalidTime(_))));
        assert!(matches!(to_epoch_seconds("2021-05-01", "12:00:NaN"), Err(TimestampError::InvalidTime(_))));
    }

    #[test]
    fn test_error_display() {
        let msg = TimestampError::InvalidDate("2021-13-01".to_string()).to_string();
        assert!(msg.contains("2021-13-01"));
        assert!(msg.contains("YYYY-MM-DD"));
    }
}
