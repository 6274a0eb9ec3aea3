//! Volume-at-price histogram with Point of Control and Value Area.
//!
//! [`build_profile`] is a pure function of its [`ProfileRequest`]:
//! - the price span `min(low)..max(high)` of the well-formed bars is cut into
//!   rows according to [`RowsLayout`];
//! - each bar spreads its volume over the rows it overlaps, proportionally to
//!   the overlap length, and the shares are normalized so no volume is lost to
//!   floating-point edges;
//! - the up/down split comes from intrabar sub-bars when they are supplied,
//!   otherwise from the whole bar's `close >= open`;
//! - the POC is the heaviest row (lowest index on ties) and the Value Area
//!   grows outward from it until it holds `value_area_pct` of the volume.
//!
//! Degenerate input (no usable bars, zero span, zero volume) yields
//! [`VolumeProfile::empty`], never rows holding NaN.

use std::{fmt, str::FromStr};

use market_data::{Bar, Timeframe, ascending};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hard cap on the number of rows a single profile may have.
pub const MAX_ROWS: usize = 10_000;

pub const DEFAULT_NUM_ROWS: usize = 24;
pub const DEFAULT_VALUE_AREA_PCT: f64 = 0.70;
pub const DEFAULT_TICK_SIZE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum RowsLayout {
    /// A fixed number of equal-width rows across the span.
    #[default]
    NumberOfRows,
    /// Rows `tick_size * num_rows` wide; the row count follows from the span.
    TicksPerRow,
}

impl RowsLayout {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NumberOfRows => "Number of Rows",
            Self::TicksPerRow => "Ticks Per Row",
        }
    }
}

impl fmt::Display for RowsLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Never fails: anything unrecognized is [`RowsLayout::NumberOfRows`].
impl FromStr for RowsLayout {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Ok(match norm.as_str() {
            "ticksperrow" | "ticks" => Self::TicksPerRow,
            _ => Self::NumberOfRows,
        })
    }
}

impl From<String> for RowsLayout {
    fn from(s: String) -> Self {
        let Ok(layout) = s.parse();
        layout
    }
}

impl From<RowsLayout> for &'static str {
    fn from(layout: RowsLayout) -> Self {
        layout.as_str()
    }
}

/// The binning knobs shared by every variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub rows_layout: RowsLayout,
    pub num_rows: usize,
    /// Fraction of total volume the Value Area must hold, clamped to `[0, 1]`.
    pub value_area_pct: f64,
    pub tick_size: f64,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            rows_layout: RowsLayout::NumberOfRows,
            num_rows: DEFAULT_NUM_ROWS,
            value_area_pct: DEFAULT_VALUE_AREA_PCT,
            tick_size: DEFAULT_TICK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileRequest<'a> {
    pub bars: &'a [Bar],
    pub settings: ProfileSettings,
    /// Resolution of `bars`; bounds the last parent bar when grouping `intrabar`.
    pub ltf: Option<Timeframe>,
    /// Finer bars used only to improve the up/down split.
    pub intrabar: Option<&'a [Bar]>,
}

impl<'a> ProfileRequest<'a> {
    pub fn new(bars: &'a [Bar], settings: ProfileSettings) -> Self {
        Self {
            bars,
            settings,
            ltf: None,
            intrabar: None,
        }
    }

    pub fn with_intrabar(mut self, intrabar: &'a [Bar], ltf: Timeframe) -> Self {
        self.intrabar = Some(intrabar);
        self.ltf = Some(ltf);
        self
    }
}

/// One price row. `price_end` is exclusive except for the top row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub price_start: f64,
    pub price_end: f64,
    pub up_volume: f64,
    pub down_volume: f64,
    pub total_volume: f64,
    pub delta_volume: f64,
}

impl Bin {
    pub fn mid_price(&self) -> f64 {
        (self.price_start + self.price_end) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeProfile {
    /// Ascending by price.
    pub bins: Vec<Bin>,
    pub num_rows: usize,
    pub poc_price: f64,
    pub vah_price: f64,
    pub val_price: f64,
    pub poc_index: usize,
    pub vah_index: usize,
    pub val_index: usize,
    pub total_volume: f64,
    pub value_area_volume: f64,
}

impl VolumeProfile {
    pub fn empty() -> Self {
        Self {
            bins: Vec::new(),
            num_rows: 0,
            poc_price: 0.0,
            vah_price: 0.0,
            val_price: 0.0,
            poc_index: 0,
            vah_index: 0,
            val_index: 0,
            total_volume: 0.0,
            value_area_volume: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Share of total volume inside `[val_index, vah_index]`; `0` when empty.
    pub fn value_area_ratio(&self) -> f64 {
        if self.total_volume > 0.0 {
            self.value_area_volume / self.total_volume
        } else {
            0.0
        }
    }
}

/// Row geometry over a price span.
#[derive(Debug, Clone, Copy)]
struct Grid {
    low: f64,
    width: f64,
    rows: usize,
    top: f64,
}

impl Grid {
    fn resolve(settings: &ProfileSettings, low: f64, high: f64) -> Option<Self> {
        let span = high - low;
        if span <= 0.0 || !span.is_finite() {
            return None;
        }

        let ticks = settings.rows_layout == RowsLayout::TicksPerRow;
        let ticks_width = settings.tick_size * settings.num_rows as f64;
        if ticks && ticks_width > 0.0 && ticks_width.is_finite() {
            let wanted = (span / ticks_width).ceil();
            if wanted <= MAX_ROWS as f64 {
                let rows = (wanted as usize).max(1);
                return Some(Self {
                    low,
                    width: ticks_width,
                    rows,
                    top: low + rows as f64 * ticks_width,
                });
            }
            debug!(wanted, cap = MAX_ROWS, "tick rows exceed cap, widening rows");
            return Some(Self::even(low, high, MAX_ROWS));
        }
        if ticks {
            debug!(tick_size = settings.tick_size, "non-positive tick size, using row count");
        }

        match settings.num_rows.min(MAX_ROWS) {
            0 => None,
            rows => Some(Self::even(low, high, rows)),
        }
    }

    fn even(low: f64, high: f64, rows: usize) -> Self {
        Self {
            low,
            width: (high - low) / rows as f64,
            rows,
            top: high,
        }
    }

    fn edge(&self, k: usize) -> f64 {
        if k >= self.rows {
            self.top
        } else {
            self.low + k as f64 * self.width
        }
    }

    fn index_of(&self, price: f64) -> usize {
        let raw = ((price - self.low) / self.width).floor();
        if raw.is_nan() || raw < 0.0 {
            0
        } else {
            (raw as usize).min(self.rows - 1)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Acc {
    up: f64,
    down: f64,
}

impl Grid {
    /// Spreads `volume` over the rows `[low, high]` touches.
    fn distribute(&self, acc: &mut [Acc], low: f64, high: f64, volume: f64, up: bool) {
        let low = low.clamp(self.low, self.top);
        let high = high.clamp(self.low, self.top);
        let first = self.index_of(low);
        let last = self.index_of(high);

        let add = |slot: &mut Acc, v: f64| {
            if up {
                slot.up += v;
            } else {
                slot.down += v;
            }
        };

        if first == last || high <= low {
            add(&mut acc[first], volume);
            return;
        }

        let overlap = |k: usize| (high.min(self.edge(k + 1)) - low.max(self.edge(k))).max(0.0);
        let covered: f64 = (first..=last).map(overlap).sum();
        if covered <= 0.0 || !covered.is_finite() {
            add(&mut acc[first], volume);
            return;
        }
        for k in first..=last {
            add(&mut acc[k], volume * overlap(k) / covered);
        }
    }
}

/// Builds a volume profile from `req`. Input order does not matter.
pub fn build_profile(req: &ProfileRequest<'_>) -> VolumeProfile {
    let ordered = ascending(req.bars);
    let bars: Vec<Bar> = ordered.iter().copied().filter(Bar::is_well_formed).collect();
    let skipped = ordered.len() - bars.len();
    if skipped > 0 {
        debug!(skipped, "skipping malformed bars");
    }

    let Some((low, high)) = price_span(&bars) else {
        return VolumeProfile::empty();
    };
    let Some(grid) = Grid::resolve(&req.settings, low, high) else {
        debug!(low, high, "degenerate price span");
        return VolumeProfile::empty();
    };

    let mut acc = vec![Acc::default(); grid.rows];
    let children = req
        .intrabar
        .map(|sub| group_intrabar(&bars, sub, req.ltf))
        .unwrap_or_default();

    for (i, bar) in bars.iter().enumerate() {
        match children.get(i).filter(|c| !c.is_empty()) {
            Some(subs) => {
                let sub_total: f64 = subs.iter().map(|b| b.volume).sum();
                for sub in subs {
                    let share = bar.volume * sub.volume / sub_total;
                    grid.distribute(&mut acc, sub.low, sub.high, share, sub.is_up());
                }
            }
            None => grid.distribute(&mut acc, bar.low, bar.high, bar.volume, bar.is_up()),
        }
    }

    let bins: Vec<Bin> = acc
        .iter()
        .enumerate()
        .map(|(k, a)| Bin {
            price_start: grid.edge(k),
            price_end: grid.edge(k + 1),
            up_volume: a.up,
            down_volume: a.down,
            total_volume: a.up + a.down,
            delta_volume: a.up - a.down,
        })
        .collect();

    let total: f64 = bins.iter().map(|b| b.total_volume).sum();
    if total <= 0.0 || !total.is_finite() {
        debug!(total, "profile holds no volume");
        return VolumeProfile::empty();
    }

    let poc_index = point_of_control(&bins);
    let (val_index, vah_index, value_area_volume) =
        value_area(&bins, poc_index, req.settings.value_area_pct.clamp(0.0, 1.0) * total);

    VolumeProfile {
        num_rows: bins.len(),
        poc_price: bins[poc_index].mid_price(),
        vah_price: bins[vah_index].price_end,
        val_price: bins[val_index].price_start,
        poc_index,
        vah_index,
        val_index,
        total_volume: total,
        value_area_volume,
        bins,
    }
}

fn price_span(bars: &[Bar]) -> Option<(f64, f64)> {
    let low = bars.iter().map(|b| b.low).reduce(f64::min)?;
    let high = bars.iter().map(|b| b.high).reduce(f64::max)?;
    Some((low, high))
}

/// Assigns each sub-bar to the parent whose `[time, next parent time)` holds it.
/// The last parent ends at `time + ltf`, or never when `ltf` is unknown.
fn group_intrabar(parents: &[Bar], sub: &[Bar], ltf: Option<Timeframe>) -> Vec<Vec<Bar>> {
    let sub = ascending(sub);
    let mut groups = vec![Vec::new(); parents.len()];
    let mut p = 0;
    for child in sub.iter().filter(|b| b.is_well_formed() && b.volume > 0.0) {
        while p < parents.len() && child.time >= parent_end(parents, p, ltf) {
            p += 1;
        }
        match parents.get(p) {
            Some(parent) if child.time >= parent.time => groups[p].push(*child),
            Some(_) => {}
            None => break,
        }
    }
    groups
}

fn parent_end(parents: &[Bar], p: usize, ltf: Option<Timeframe>) -> i64 {
    match (parents.get(p + 1), ltf) {
        (Some(next), _) => next.time,
        (None, Some(tf)) => parents[p].time.saturating_add(tf.seconds()),
        (None, None) => i64::MAX,
    }
}

/// Heaviest row; the lowest index wins ties.
fn point_of_control(bins: &[Bin]) -> usize {
    let mut best = 0;
    for (k, bin) in bins.iter().enumerate().skip(1) {
        if bin.total_volume > bins[best].total_volume {
            best = k;
        }
    }
    best
}

/// Grows `[lo, hi]` from `poc` until it holds at least `target`.
///
/// The heavier neighbour is taken first. On equal neighbours the upper one is
/// taken, and the lower one too unless the upper alone reaches the target.
fn value_area(bins: &[Bin], poc: usize, target: f64) -> (usize, usize, f64) {
    let (mut lo, mut hi) = (poc, poc);
    let mut volume = bins[poc].total_volume;
    while volume < target {
        let below = lo.checked_sub(1).map(|k| bins[k].total_volume);
        let above = bins.get(hi + 1).map(|b| b.total_volume);
        match (below, above) {
            (None, None) => break,
            (Some(b), None) => {
                lo -= 1;
                volume += b;
            }
            (None, Some(a)) => {
                hi += 1;
                volume += a;
            }
            (Some(b), Some(a)) if a > b => {
                hi += 1;
                volume += a;
            }
            (Some(b), Some(a)) if b > a => {
                lo -= 1;
                volume += b;
            }
            (Some(b), Some(a)) => {
                hi += 1;
                volume += a;
                if volume < target {
                    lo -= 1;
                    volume += b;
                }
            }
        }
    }
    (lo, hi, volume)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
        Bar {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    fn rows(n: usize) -> ProfileSettings {
        ProfileSettings {
            num_rows: n,
            ..ProfileSettings::default()
        }
    }

    fn bins_with(volumes: &[f64]) -> Vec<Bin> {
        volumes
            .iter()
            .enumerate()
            .map(|(k, &v)| Bin {
                price_start: k as f64,
                price_end: k as f64 + 1.0,
                up_volume: v,
                down_volume: 0.0,
                total_volume: v,
                delta_volume: v,
            })
            .collect()
    }

    #[test]
    fn single_up_bar_spreads_evenly() {
        let bars = [bar(1, 100.0, 110.0, 100.0, 110.0, 500.0)];
        let p = build_profile(&ProfileRequest::new(&bars, rows(5)));

        assert_eq!(p.bins.len(), 5);
        for b in &p.bins {
            assert!((b.total_volume - 100.0).abs() < 1e-9);
            assert_eq!(b.down_volume, 0.0);
            assert_eq!(b.up_volume, b.delta_volume);
        }
        assert_eq!(p.poc_index, 0);
        assert_eq!(p.bins[4].price_end, 110.0);
    }

    #[test]
    fn partial_overlap_is_proportional() {
        // span 0..10 in 10 rows; second bar covers 2.5..4.0
        let bars = [
            bar(1, 0.0, 10.0, 0.0, 10.0, 0.0),
            bar(2, 3.0, 4.0, 2.5, 3.0, 30.0),
        ];
        let p = build_profile(&ProfileRequest::new(&bars, rows(10)));
        assert!((p.bins[2].total_volume - 10.0).abs() < 1e-9);
        assert!((p.bins[3].total_volume - 20.0).abs() < 1e-9);
        assert_eq!(p.poc_index, 3);
    }

    #[test]
    fn degenerate_bar_lands_in_one_row() {
        let bars = [
            bar(1, 1.0, 10.0, 0.0, 0.0, 10.0),
            bar(2, 5.5, 5.5, 5.5, 5.5, 40.0),
        ];
        let p = build_profile(&ProfileRequest::new(&bars, rows(10)));
        assert!((p.bins[5].total_volume - 41.0).abs() < 1e-9);
        assert!((p.bins[5].down_volume - 1.0).abs() < 1e-9);
    }

    #[test]
    fn flat_or_silent_input_is_empty() {
        let flat = [bar(1, 5.0, 5.0, 5.0, 5.0, 100.0)];
        assert!(build_profile(&ProfileRequest::new(&flat, rows(10))).is_empty());

        let silent = [
            bar(1, 1.0, 2.0, 1.0, 2.0, 0.0),
            bar(2, 2.0, 3.0, 2.0, 3.0, 0.0),
        ];
        assert!(build_profile(&ProfileRequest::new(&silent, rows(10))).is_empty());
        assert!(build_profile(&ProfileRequest::new(&[], rows(10))).is_empty());
        assert!(build_profile(&ProfileRequest::new(&silent, rows(0))).is_empty());
    }

    #[test]
    fn malformed_bars_are_skipped() {
        let bars = [
            bar(1, 1.0, 2.0, 1.0, 2.0, 10.0),
            bar(2, 1.0, 0.5, 3.0, 2.0, 99.0),
            bar(3, 1.0, f64::NAN, 1.0, 2.0, 99.0),
            bar(4, 1.0, 2.0, 1.0, 2.0, -5.0),
        ];
        let p = build_profile(&ProfileRequest::new(&bars, rows(4)));
        assert!((p.total_volume - 10.0).abs() < 1e-9);
        assert!(p.bins.iter().all(|b| b.total_volume.is_finite()));
    }

    #[test]
    fn ticks_per_row_derives_row_count() {
        let settings = ProfileSettings {
            rows_layout: RowsLayout::TicksPerRow,
            num_rows: 4,
            tick_size: 0.25,
            ..ProfileSettings::default()
        };
        // width 1.0 over a 4.5 span -> 5 rows, top edge past the high
        let bars = [bar(1, 10.0, 14.5, 10.0, 14.0, 100.0)];
        let p = build_profile(&ProfileRequest::new(&bars, settings));
        assert_eq!(p.num_rows, 5);
        assert_eq!(p.bins[4].price_end, 15.0);
        assert!((p.total_volume - 100.0).abs() < 1e-9);
    }

    #[test]
    fn bad_tick_size_falls_back_to_row_count() {
        let settings = ProfileSettings {
            rows_layout: RowsLayout::TicksPerRow,
            num_rows: 8,
            tick_size: 0.0,
            ..ProfileSettings::default()
        };
        let bars = [bar(1, 1.0, 2.0, 1.0, 2.0, 10.0)];
        assert_eq!(build_profile(&ProfileRequest::new(&bars, settings)).num_rows, 8);
    }

    #[test]
    fn row_count_is_capped() {
        let bars = [bar(1, 0.0, 1.0, 0.0, 1.0, 1.0)];
        assert_eq!(build_profile(&ProfileRequest::new(&bars, rows(50_000))).num_rows, MAX_ROWS);

        let tiny_ticks = ProfileSettings {
            rows_layout: RowsLayout::TicksPerRow,
            num_rows: 1,
            tick_size: 1e-9,
            ..ProfileSettings::default()
        };
        assert_eq!(build_profile(&ProfileRequest::new(&bars, tiny_ticks)).num_rows, MAX_ROWS);
    }

    #[test]
    fn intrabar_split_overrides_parent_direction() {
        // parent closes up, but two thirds of its volume traded on a down sub-bar
        let parent = [bar(0, 10.0, 12.0, 10.0, 11.0, 90.0)];
        let subs = [
            bar(0, 10.0, 11.0, 10.0, 11.0, 10.0),
            bar(60, 12.0, 12.0, 11.0, 11.0, 20.0),
            bar(300, 1.0, 1.0, 1.0, 1.0, 1_000.0), // next parent window
        ];
        let req = ProfileRequest::new(&parent, rows(2)).with_intrabar(&subs, Timeframe::FIVE_MINUTES);
        let p = build_profile(&req);

        assert!((p.total_volume - 90.0).abs() < 1e-9);
        assert!((p.bins[0].up_volume - 30.0).abs() < 1e-9);
        assert!((p.bins[1].down_volume - 60.0).abs() < 1e-9);
        assert!((p.bins[1].delta_volume + 60.0).abs() < 1e-9);
    }

    #[test]
    fn missing_intrabar_falls_back_per_parent() {
        let parents = [
            bar(0, 10.0, 12.0, 10.0, 11.0, 50.0),
            bar(300, 11.0, 12.0, 10.0, 10.5, 50.0),
        ];
        let subs = [bar(30, 11.0, 11.0, 10.0, 10.0, 5.0)];
        let req = ProfileRequest::new(&parents, rows(1)).with_intrabar(&subs, Timeframe::FIVE_MINUTES);
        let p = build_profile(&req);
        // first parent follows its down sub-bar, second its own down close
        assert!((p.bins[0].down_volume - 100.0).abs() < 1e-9);
    }

    #[test]
    fn poc_prefers_lowest_index_on_ties() {
        assert_eq!(point_of_control(&bins_with(&[1.0, 5.0, 5.0, 2.0])), 1);
    }

    #[test]
    fn value_area_takes_heavier_side() {
        let bins = bins_with(&[10.0, 30.0, 40.0, 5.0, 15.0]);
        // total 100, target 70: 40 -> +30 below -> 70
        assert_eq!(value_area(&bins, 2, 70.0), (1, 2, 70.0));
    }

    #[test]
    fn value_area_tie_stops_after_upper_when_enough() {
        let bins = bins_with(&[10.0, 20.0, 40.0, 20.0, 10.0]);
        assert_eq!(value_area(&bins, 2, 60.0), (2, 3, 60.0));
        assert_eq!(value_area(&bins, 2, 70.0), (1, 3, 80.0));
    }

    #[test]
    fn value_area_extends_remaining_side_at_edge() {
        let bins = bins_with(&[50.0, 10.0, 10.0, 30.0]);
        assert_eq!(value_area(&bins, 0, 70.0), (0, 2, 70.0));
        assert_eq!(value_area(&bins, 0, 80.0), (0, 3, 100.0));
    }

    #[test]
    fn value_area_pct_is_clamped() {
        let bars = [bar(1, 0.0, 10.0, 0.0, 10.0, 100.0)];
        let over = ProfileSettings {
            value_area_pct: 3.0,
            ..rows(5)
        };
        let p = build_profile(&ProfileRequest::new(&bars, over));
        assert_eq!((p.val_index, p.vah_index), (0, 4));

        let under = ProfileSettings {
            value_area_pct: -1.0,
            ..rows(5)
        };
        let p = build_profile(&ProfileRequest::new(&bars, under));
        assert_eq!((p.val_index, p.vah_index), (p.poc_index, p.poc_index));
    }

    #[test]
    fn descending_input_matches_ascending() {
        let up = [
            bar(1, 1.0, 3.0, 1.0, 2.0, 10.0),
            bar(2, 2.0, 5.0, 2.0, 4.0, 20.0),
            bar(3, 4.0, 4.5, 3.0, 3.5, 15.0),
        ];
        let mut down = up;
        down.reverse();
        assert_eq!(
            build_profile(&ProfileRequest::new(&up, rows(6))),
            build_profile(&ProfileRequest::new(&down, rows(6)))
        );
    }

    #[test]
    fn rows_layout_parses_leniently() {
        assert_eq!("Ticks Per Row".parse::<RowsLayout>(), Ok(RowsLayout::TicksPerRow));
        assert_eq!("ticks_per_row".parse::<RowsLayout>(), Ok(RowsLayout::TicksPerRow));
        assert_eq!("Number of Rows".parse::<RowsLayout>(), Ok(RowsLayout::NumberOfRows));
        assert_eq!("volume".parse::<RowsLayout>(), Ok(RowsLayout::NumberOfRows));
    }
}
