//! Lower-timeframe selection for volume distribution.
//!
//! The finest resolution a display timeframe conventionally allows is the
//! starting rung; from there the ladder is climbed until the visible range
//! needs at most [`MAX_LTF_BARS`] bars, and the result is snapped to a
//! resolution the feed actually serves.

use market_data::{
    Timeframe, TimeframeUnit,
    providers::rest::params::{DEFAULT_SERVED, FUTURES_SERVED},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper bound on LTF bars per visible range.
pub const MAX_LTF_BARS: i64 = 5_000;

const LADDER: [Timeframe; 7] = [
    Timeframe::ONE_MINUTE,
    Timeframe::FIVE_MINUTES,
    Timeframe::FIFTEEN_MINUTES,
    Timeframe::THIRTY_MINUTES,
    Timeframe::ONE_HOUR,
    Timeframe::FOUR_HOURS,
    Timeframe::ONE_DAY,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LtfSelection {
    #[default]
    Auto,
    Forced(Timeframe),
}

impl LtfSelection {
    pub fn resolve(self, range_start: i64, range_end: i64, display: Timeframe, futures: bool) -> Timeframe {
        match self {
            Self::Auto => select_ltf(range_start, range_end, display, futures),
            Self::Forced(tf) => tf,
        }
    }
}

/// The finest LTF a display timeframe starts from.
pub fn conventional_ltf(display: Timeframe, futures: bool) -> Timeframe {
    if futures && display.seconds() < Timeframe::ONE_HOUR.seconds() {
        return Timeframe::ONE_MINUTE;
    }
    match (display.unit(), display.amount().get()) {
        (TimeframeUnit::Day, 1) => Timeframe::FIVE_MINUTES,
        (TimeframeUnit::Week, 1) => Timeframe::ONE_HOUR,
        (TimeframeUnit::Hour, 4) => Timeframe::ONE_HOUR,
        (TimeframeUnit::Hour, 1) => Timeframe::FIVE_MINUTES,
        (TimeframeUnit::Minute, 15) => Timeframe::FIVE_MINUTES,
        (TimeframeUnit::Minute, 5) => Timeframe::FIVE_MINUTES,
        _ => {
            let secs = display.seconds();
            if secs >= Timeframe::ONE_WEEK.seconds() {
                Timeframe::ONE_HOUR
            } else if secs >= Timeframe::ONE_DAY.seconds() {
                Timeframe::FIVE_MINUTES
            } else if secs >= Timeframe::FOUR_HOURS.seconds() {
                Timeframe::ONE_HOUR
            } else {
                Timeframe::FIVE_MINUTES
            }
        }
    }
}

/// Bars of `tf` needed to cover `[start, end)`.
pub fn bars_in_range(start: i64, end: i64, tf: Timeframe) -> i64 {
    let span = end.saturating_sub(start).max(0);
    (span + tf.seconds() - 1) / tf.seconds()
}

/// Picks the LTF to fetch for the visible range `[range_start, range_end)`.
pub fn select_ltf(range_start: i64, range_end: i64, display: Timeframe, futures: bool) -> Timeframe {
    let start = conventional_ltf(display, futures);
    let logical = LADDER
        .iter()
        .copied()
        .filter(|tf| tf.seconds() >= start.seconds())
        .find(|&tf| bars_in_range(range_start, range_end, tf) <= MAX_LTF_BARS)
        .unwrap_or(Timeframe::ONE_DAY);
    let served = served_resolution(logical, futures);
    let chart = display;
    debug!(
        %chart,
        %logical,
        %served,
        bars = bars_in_range(range_start, range_end, served),
        "resolved lower timeframe"
    );
    served
}

/// Nearest served resolution that is not finer than `logical`; the coarsest
/// served one if every resolution is finer.
pub fn served_resolution(logical: Timeframe, futures: bool) -> Timeframe {
    let served = if futures { FUTURES_SERVED } else { DEFAULT_SERVED };
    served
        .iter()
        .copied()
        .filter(|tf| tf.seconds() >= logical.seconds())
        .min_by_key(|tf| tf.seconds())
        .or_else(|| served.iter().copied().max_by_key(|tf| tf.seconds()))
        .unwrap_or(logical)
}

/// The next served resolution finer than `ltf`, used for intrabar classification.
pub fn finer_served(ltf: Timeframe, futures: bool) -> Option<Timeframe> {
    let served = if futures { FUTURES_SERVED } else { DEFAULT_SERVED };
    served
        .iter()
        .copied()
        .filter(|tf| tf.seconds() < ltf.seconds())
        .max_by_key(|tf| tf.seconds())
}
