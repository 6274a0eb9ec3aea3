//! Timestamp normalization helpers.
//!
//! Everything past the provider edge speaks UTC seconds (`i64`). These helpers
//! convert whatever a data source hands us into that form:
//! - [`parse_iso_to_secs`]: RFC-3339 with offset, naive `YYYY-MM-DDTHH:MM:SS[.fff]`
//!   (assumed UTC) or a bare `YYYY-MM-DD` date.
//! - [`normalize_epoch`]: epoch values that may be milliseconds.
//! - [`to_rfc3339`]: the reverse direction, for query strings and logs.
//!
//! Example:
//! - "2024-03-10T09:30:00-05:00" -> 1710081000 (14:30Z)

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::errors::Error;

/// Any epoch value above this is taken to be milliseconds (year 5138 in seconds).
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Parse an ISO-8601 timestamp into UTC seconds.
pub fn parse_iso_to_secs(s: &str) -> Result<i64, Error> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc).timestamp());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc().timestamp());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp());
        }
    }
    Err(Error::InvalidTimestamp(s.to_string()))
}

/// Normalize an epoch value that may be in milliseconds to seconds.
pub fn normalize_epoch(raw: i64) -> i64 {
    if raw.abs() >= MILLIS_THRESHOLD {
        raw.div_euclid(1000)
    } else {
        raw
    }
}

pub fn secs_to_utc(secs: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| Error::InvalidTimestamp(secs.to_string()))
}

/// Format UTC seconds as RFC-3339 (`2024-03-10T14:30:00Z`).
pub fn to_rfc3339(secs: i64) -> Result<String, Error> {
    Ok(secs_to_utc(secs)?.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn rfc3339_offset_to_utc() {
        let got = parse_iso_to_secs("2024-03-10T09:30:00-05:00").unwrap();
        assert_eq!(to_rfc3339(got).unwrap(), "2024-03-10T14:30:00Z");
    }

    #[test]
    fn naive_and_date_only_are_utc() {
        let a = parse_iso_to_secs("2024-01-02T00:00:00").unwrap();
        let b = parse_iso_to_secs("2024-01-02").unwrap();
        let c = parse_iso_to_secs("2024-01-02T00:00:00.000Z").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a, 1_704_153_600);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(matches!(
            parse_iso_to_secs("yesterday"),
            Err(Error::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn millis_are_scaled_down() {
        assert_eq!(normalize_epoch(1_704_153_600_000), 1_704_153_600);
        assert_eq!(normalize_epoch(1_704_153_600), 1_704_153_600);
    }

    proptest! {
        #[test]
        fn rfc3339_output_parses_back(secs in 0i64..4_102_444_800) {
            let text = to_rfc3339(secs).unwrap();
            prop_assert_eq!(parse_iso_to_secs(&text).unwrap(), secs);
        }

        #[test]
        fn millis_and_secs_agree(secs in 946_684_800i64..4_102_444_800) {
            prop_assert_eq!(normalize_epoch(secs * 1000), secs);
            prop_assert_eq!(normalize_epoch(secs), secs);
        }
    }
}
