//! Canonical in-memory representation of a time-series bar (OHLCV).
//!
//! This struct is the standard output of every [`DataProvider`](crate::providers::DataProvider)
//! and the standard input of the volume profile engine, regardless of asset class.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::timeframe::Timeframe;

/// A single time-series bar (OHLCV).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time, UTC seconds since the Unix epoch.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Whole-bar classification: a bar that closes at or above its open is "up".
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }

    /// Finite prices, `high >= low`, and a finite non-negative volume.
    ///
    /// Bars failing this check are upstream corruption and get skipped by the engine.
    pub fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
            && self.high >= self.low
            && self.volume >= 0.0
    }
}

/// Represents a complete set of time-series data for a single symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    /// The symbol this data represents (e.g., "AAPL", "ESU24").
    pub symbol: String,
    /// The time interval for each bar in the series.
    pub timeframe: Timeframe,
    /// Bars in ascending time order.
    pub bars: Vec<Bar>,
}

impl BarSeries {
    /// Builds a series, reversing `bars` if they arrived newest-first.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, mut bars: Vec<Bar>) -> Self {
        if is_descending(&bars) {
            bars.reverse();
        }
        Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        }
    }
}

fn is_descending(bars: &[Bar]) -> bool {
    match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => first.time > last.time,
        _ => false,
    }
}

/// Returns `bars` in ascending time order without touching the input.
///
/// Descending input is reversed (O(n)), never sorted; ascending input is borrowed as is.
pub fn ascending(bars: &[Bar]) -> Cow<'_, [Bar]> {
    if is_descending(bars) {
        Cow::Owned(bars.iter().rev().copied().collect())
    } else {
        Cow::Borrowed(bars)
    }
}
