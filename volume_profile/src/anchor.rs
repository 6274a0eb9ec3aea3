//! Where an anchored profile starts accumulating.

use std::{fmt, str::FromStr};

use chrono::Datelike;
use market_data::{Bar, Timeframe, TimeframeUnit, ascending};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    period::{PeriodClock, PeriodType},
    window::VisibleWindow,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum AnchorMode {
    /// Start of the calendar period holding the window's end.
    #[default]
    Auto,
    HighestHigh,
    LowestLow,
}

impl AnchorMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::HighestHigh => "Highest High",
            Self::LowestLow => "Lowest Low",
        }
    }
}

impl fmt::Display for AnchorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Never fails: anything unrecognized is [`AnchorMode::Auto`].
impl FromStr for AnchorMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Ok(match norm.as_str() {
            "highesthigh" | "hh" => Self::HighestHigh,
            "lowestlow" | "ll" => Self::LowestLow,
            _ => Self::Auto,
        })
    }
}

impl From<String> for AnchorMode {
    fn from(s: String) -> Self {
        let Ok(mode) = s.parse();
        mode
    }
}

impl From<AnchorMode> for &'static str {
    fn from(mode: AnchorMode) -> Self {
        mode.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorResult {
    pub anchor_time: i64,
    /// The extreme price for `HighestHigh`/`LowestLow`.
    pub anchor_price: Option<f64>,
    /// The calendar granularity used by `Auto`.
    pub anchor_period: Option<PeriodType>,
}

/// Calendar granularity an `Auto` anchor resets on for a display timeframe.
pub fn auto_granularity(display: Timeframe) -> PeriodType {
    let secs = display.seconds();
    let day = Timeframe::ONE_DAY.seconds();
    if secs < day {
        PeriodType::Session
    } else if secs == day {
        PeriodType::Month
    } else if secs < Timeframe::ONE_WEEK.seconds() {
        PeriodType::Quarter
    } else if secs < Timeframe::ONE_MONTH.seconds() {
        PeriodType::Year
    } else {
        PeriodType::Decade
    }
}

/// Chart bar at `display` that a bar opening at `time` belongs to. Weekly and
/// monthly bars follow the calendar; other sizes are epoch-aligned.
fn chart_slot(time: i64, display: Timeframe) -> i64 {
    let calendar = match (display.unit(), display.amount().get()) {
        (TimeframeUnit::Week, 1) => Some(PeriodType::Week),
        (TimeframeUnit::Month, 1) => Some(PeriodType::Month),
        _ => None,
    };
    calendar
        .and_then(|period| PeriodClock::utc().key(period, time))
        .map_or_else(
            || time.div_euclid(display.seconds()),
            |first| i64::from(first.num_days_from_ce()),
        )
}

/// Index of the first bar inside the last `length` chart bars of `bars`.
fn lookback_start(bars: &[Bar], display: Timeframe, length: usize) -> usize {
    let mut seen = 0;
    let mut current = None;
    for (i, bar) in bars.iter().enumerate().rev() {
        let slot = chart_slot(bar.time, display);
        if current != Some(slot) {
            seen += 1;
            if seen > length {
                return i + 1;
            }
            current = Some(slot);
        }
    }
    0
}

/// Resolves the anchor for `mode` over `bars` within `window`.
///
/// `length` is the extremum lookback in `display` bars (at least one); finer
/// bars are grouped into the chart bar they fall in. Calendar math is UTC.
pub fn resolve_anchor(
    mode: AnchorMode,
    bars: &[Bar],
    window: &VisibleWindow,
    display: Timeframe,
    length: usize,
) -> AnchorResult {
    let fallback = AnchorResult {
        anchor_time: window.from_time,
        anchor_price: None,
        anchor_period: None,
    };

    match mode {
        AnchorMode::Auto => {
            let period = auto_granularity(display);
            let start = PeriodClock::utc()
                .span(period, window.to_time)
                .map_or(window.from_time, |s| s.start_time);
            AnchorResult {
                anchor_time: start.max(window.from_time),
                anchor_price: None,
                anchor_period: Some(period),
            }
        }
        AnchorMode::HighestHigh | AnchorMode::LowestLow => {
            let bars = ascending(bars);
            let recent = &bars[lookback_start(&bars, display, length.max(1))..];
            let better = |candidate: f64, best: f64| match mode {
                AnchorMode::HighestHigh => candidate > best,
                _ => candidate < best,
            };
            let price_of = |b: &Bar| match mode {
                AnchorMode::HighestHigh => b.high,
                _ => b.low,
            };

            let mut best: Option<&Bar> = None;
            for bar in recent.iter().rev().filter(|b| b.is_well_formed()) {
                if best.is_none_or(|b| better(price_of(bar), price_of(b))) {
                    best = Some(bar);
                }
            }
            match best {
                Some(bar) => AnchorResult {
                    anchor_time: bar.time,
                    anchor_price: Some(price_of(bar)),
                    anchor_period: None,
                },
                None => {
                    debug!(%mode, "no bars to anchor on, using window start");
                    fallback
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn ts(y: i32, m: u32, d: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap().timestamp()
    }

    fn window(from: i64, to: i64) -> VisibleWindow {
        VisibleWindow {
            from_time: from,
            to_time: to,
            from_index: 0,
            to_index: 1,
            bars_in_window: 2,
            price_min: 0.0,
            price_max: 0.0,
        }
    }

    fn bar(time: i64, high: f64, low: f64) -> Bar {
        Bar {
            time,
            open: low,
            high,
            low,
            close: high,
            volume: 1.0,
        }
    }

    #[test]
    fn granularity_ladder() {
        assert_eq!(auto_granularity(Timeframe::FIVE_MINUTES), PeriodType::Session);
        assert_eq!(auto_granularity(Timeframe::FOUR_HOURS), PeriodType::Session);
        assert_eq!(auto_granularity(Timeframe::ONE_DAY), PeriodType::Month);
        assert_eq!(auto_granularity("3D".parse().unwrap()), PeriodType::Quarter);
        assert_eq!(auto_granularity(Timeframe::ONE_WEEK), PeriodType::Year);
        assert_eq!(auto_granularity(Timeframe::ONE_MONTH), PeriodType::Decade);
    }

    #[test]
    fn auto_anchors_on_period_start() {
        let w = window(ts(2024, 1, 15), ts(2024, 5, 20));
        let a = resolve_anchor(AnchorMode::Auto, &[], &w, Timeframe::ONE_DAY, 0);
        assert_eq!(a.anchor_time, ts(2024, 5, 1));
        assert_eq!(a.anchor_period, Some(PeriodType::Month));
        assert_eq!(a.anchor_price, None);
    }

    #[test]
    fn auto_anchor_never_precedes_window() {
        let w = window(ts(2024, 5, 10), ts(2024, 5, 20));
        let a = resolve_anchor(AnchorMode::Auto, &[], &w, Timeframe::ONE_WEEK, 0);
        assert_eq!(a.anchor_time, ts(2024, 5, 10));
    }

    const DAY: i64 = 86_400;

    #[test]
    fn most_recent_equal_high_wins() {
        let bars = [bar(DAY, 5.0, 1.0), bar(2 * DAY, 9.0, 2.0), bar(3 * DAY, 9.0, 3.0), bar(4 * DAY, 4.0, 1.0)];
        let a = resolve_anchor(AnchorMode::HighestHigh, &bars, &window(DAY, 4 * DAY), Timeframe::ONE_DAY, 10);
        assert_eq!(a.anchor_time, 3 * DAY);
        assert_eq!(a.anchor_price, Some(9.0));
    }

    #[test]
    fn lowest_low_respects_lookback() {
        let bars = [bar(DAY, 5.0, 0.5), bar(2 * DAY, 9.0, 2.0), bar(3 * DAY, 9.0, 3.0), bar(4 * DAY, 4.0, 1.0)];
        let w = window(DAY, 4 * DAY);
        let all = resolve_anchor(AnchorMode::LowestLow, &bars, &w, Timeframe::ONE_DAY, 4);
        assert_eq!((all.anchor_time, all.anchor_price), (DAY, Some(0.5)));

        let recent = resolve_anchor(AnchorMode::LowestLow, &bars, &w, Timeframe::ONE_DAY, 3);
        assert_eq!((recent.anchor_time, recent.anchor_price), (4 * DAY, Some(1.0)));
    }

    #[test]
    fn lookback_counts_chart_bars_not_intraday_bars() {
        let start = ts(2024, 1, 1);
        // two days of 5m bars, highest high on the 11th bar of day one
        let bars: Vec<Bar> = (0..576)
            .map(|i| bar(start + i * 300, if i == 10 { 120.0 } else { 110.0 }, 100.0))
            .collect();
        let w = window(start, start + DAY);

        let a = resolve_anchor(AnchorMode::HighestHigh, &bars, &w, Timeframe::ONE_DAY, 20);
        assert_eq!((a.anchor_time, a.anchor_price), (start + 3000, Some(120.0)));

        // one daily bar back only reaches the second day
        let a = resolve_anchor(AnchorMode::HighestHigh, &bars, &w, Timeframe::ONE_DAY, 1);
        assert_eq!(a.anchor_time, start + 575 * 300);
    }

    #[test]
    fn weekly_lookback_follows_monday_weeks() {
        // 2024-01-01 is a Monday; ten daily bars span two weeks
        let start = ts(2024, 1, 1);
        let bars: Vec<Bar> = (0..10)
            .map(|i| bar(start + i * DAY, if i == 6 { 50.0 } else { 40.0 }, 30.0))
            .collect();
        let a = resolve_anchor(AnchorMode::HighestHigh, &bars, &window(start, start + 9 * DAY), Timeframe::ONE_WEEK, 1);
        assert_eq!(a.anchor_time, start + 9 * DAY);

        let a = resolve_anchor(AnchorMode::HighestHigh, &bars, &window(start, start + 9 * DAY), Timeframe::ONE_WEEK, 2);
        assert_eq!(a.anchor_time, start + 6 * DAY);
    }

    #[test]
    fn no_bars_falls_back_to_window_start() {
        let a = resolve_anchor(AnchorMode::HighestHigh, &[], &window(500, 900), Timeframe::ONE_DAY, 20);
        assert_eq!(a.anchor_time, 500);
        assert_eq!(a.anchor_price, None);
    }

    #[test]
    fn unknown_mode_is_auto() {
        assert_eq!("Highest High".parse::<AnchorMode>(), Ok(AnchorMode::HighestHigh));
        assert_eq!("lowest_low".parse::<AnchorMode>(), Ok(AnchorMode::LowestLow));
        assert_eq!("vwap".parse::<AnchorMode>(), Ok(AnchorMode::Auto));
    }
}
