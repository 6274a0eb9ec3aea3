//! Timeframe utilities for expressing uniform bar intervals.
//!
//! A [`Timeframe`] pairs a non-zero amount with a [`TimeframeUnit`], covering
//! minute, hour, day, week (Monday-based) and month buckets in UTC. Display
//! timeframes coming from a chart ("D", "1W", "4h", "60") and data-source
//! resolutions ("5m", "1h", "1D") share this one type.
//!
//! ```
//! use market_data::{Timeframe, TimeframeUnit};
//!
//! let tf: Timeframe = "4h".parse().unwrap();
//! assert_eq!(tf.unit(), TimeframeUnit::Hour);
//! assert_eq!(tf.seconds(), 4 * 3600);
//! assert_eq!(tf.to_string(), "4h");
//! ```

use std::{fmt, num::NonZeroU32, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SECS_PER_MINUTE: i64 = 60;
pub const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
pub const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;
pub const SECS_PER_WEEK: i64 = 7 * SECS_PER_DAY;
/// Nominal month length used for bar-count arithmetic only.
pub const SECS_PER_MONTH: i64 = 30 * SECS_PER_DAY;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeframeError {
    #[error("empty timeframe")]
    Empty,

    #[error("Invalid amount in timeframe {input:?}")]
    InvalidAmount { input: String },

    #[error("Unknown timeframe unit {unit:?} in {input:?}")]
    UnknownUnit { input: String, unit: String },
}

/// Timeframe granularity (calendar-aware where needed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeframeUnit {
    Minute,
    Hour,
    Day,
    /// Monday-based, UTC
    Week,
    /// calendar months, UTC
    Month,
}

impl TimeframeUnit {
    const fn seconds(self) -> i64 {
        match self {
            Self::Minute => SECS_PER_MINUTE,
            Self::Hour => SECS_PER_HOUR,
            Self::Day => SECS_PER_DAY,
            Self::Week => SECS_PER_WEEK,
            Self::Month => SECS_PER_MONTH,
        }
    }
}

/// A timeframe = amount × unit (e.g. 5-Minute, 4-Hour, 1-Day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe {
    amount: NonZeroU32,
    unit: TimeframeUnit,
}

const ONE: NonZeroU32 = NonZeroU32::MIN;

impl Timeframe {
    pub const ONE_MINUTE: Self = Self::new(ONE, TimeframeUnit::Minute);
    pub const FIVE_MINUTES: Self = Self::minutes(5);
    pub const FIFTEEN_MINUTES: Self = Self::minutes(15);
    pub const THIRTY_MINUTES: Self = Self::minutes(30);
    pub const ONE_HOUR: Self = Self::new(ONE, TimeframeUnit::Hour);
    pub const FOUR_HOURS: Self = Self::hours(4);
    pub const ONE_DAY: Self = Self::new(ONE, TimeframeUnit::Day);
    pub const ONE_WEEK: Self = Self::new(ONE, TimeframeUnit::Week);
    pub const ONE_MONTH: Self = Self::new(ONE, TimeframeUnit::Month);

    pub const fn new(amount: NonZeroU32, unit: TimeframeUnit) -> Self {
        Self { amount, unit }
    }

    const fn minutes(amount: u32) -> Self {
        match NonZeroU32::new(amount) {
            Some(nz) => Self::new(nz, TimeframeUnit::Minute),
            None => unreachable!(),
        }
    }

    const fn hours(amount: u32) -> Self {
        match NonZeroU32::new(amount) {
            Some(nz) => Self::new(nz, TimeframeUnit::Hour),
            None => unreachable!(),
        }
    }

    pub const fn amount(&self) -> NonZeroU32 {
        self.amount
    }

    pub const fn unit(&self) -> TimeframeUnit {
        self.unit
    }

    /// Nominal duration in seconds (months count as 30 days).
    pub const fn seconds(&self) -> i64 {
        self.amount.get() as i64 * self.unit.seconds()
    }

    pub const fn is_intraday(&self) -> bool {
        self.seconds() < SECS_PER_DAY
    }
}

/// Display as `5m`, `4h`, `1D`, `1W`, `1M`.
impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.amount.get();
        let u = match self.unit {
            TimeframeUnit::Minute => "m",
            TimeframeUnit::Hour => "h",
            TimeframeUnit::Day => "D",
            TimeframeUnit::Week => "W",
            TimeframeUnit::Month => "M",
        };
        write!(f, "{a}{u}")
    }
}

/// Accepts chart-style strings: `5m`, `4h`, `1D`, `D`, `W`, `M`, and bare
/// minute counts such as `60`. Lowercase `m` is minutes; uppercase `M` is months.
impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TimeframeError::Empty);
        }
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);

        let amount = if digits.is_empty() {
            ONE
        } else {
            digits
                .parse::<u32>()
                .ok()
                .and_then(NonZeroU32::new)
                .ok_or_else(|| TimeframeError::InvalidAmount { input: s.to_string() })?
        };

        let unit = match unit {
            "" | "m" | "min" => TimeframeUnit::Minute,
            "h" | "H" => TimeframeUnit::Hour,
            "D" | "d" => TimeframeUnit::Day,
            "W" | "w" => TimeframeUnit::Week,
            "M" | "mo" => TimeframeUnit::Month,
            other => {
                return Err(TimeframeError::UnknownUnit {
                    input: s.to_string(),
                    unit: other.to_string(),
                });
            }
        };
        Ok(Self::new(amount, unit))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.to_string()
    }
}
