use thiserror::Error;

/// The unified error type for the `market_data` crate's non-provider paths.
/// Timeframe parsing has its own [`TimeframeError`](crate::TimeframeError).
#[derive(Debug, Error)]
pub enum Error {
    /// A timestamp could not be parsed or lies outside the representable range.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{parse_iso_to_secs, secs_to_utc};

    #[test]
    fn timestamp_failures_name_the_input() {
        let err = parse_iso_to_secs(" not-a-date ").unwrap_err();
        assert_eq!(err.to_string(), "Invalid timestamp: not-a-date");

        let err = secs_to_utc(i64::MAX).unwrap_err();
        assert!(matches!(err, Error::InvalidTimestamp(ref s) if s == &i64::MAX.to_string()));
    }
}
