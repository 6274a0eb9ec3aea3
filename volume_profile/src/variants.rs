//! The six profile variants as orchestrations of the engine.
//!
//! | kind    | input slice                         | profiles      | bounds            |
//! |---------|-------------------------------------|---------------|-------------------|
//! | `Vrvp`  | visible window                      | one           | none (full width) |
//! | `Svp`   | sessions                            | one per period| period span       |
//! | `SvpHd` | sessions, recent ones finer         | one per period| period span       |
//! | `Pvp`   | configured calendar period          | one per period| period span       |
//! | `Aavp`  | resolved anchor to window end       | one           | anchor..end       |
//! | `Vpfr`  | the two picked points               | one           | start..end        |
//!
//! Profiles that come out empty (no usable volume) are left out of the set.

use std::time::Duration;

use market_data::{Bar, Timeframe, ascending};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    anchor::{AnchorMode, resolve_anchor},
    period::{PeriodClock, PeriodType},
    profile::{ProfileRequest, ProfileSettings, RowsLayout, VolumeProfile, build_profile},
    splitter::{RowBudget, split_into_periods},
    viewport::LogicalRange,
    window::{VisibleWindow, resolve_window},
};

pub const DEFAULT_MAX_TOTAL_ROWS: usize = 6_000;
pub const DEFAULT_ROWS_PER_PERIOD: usize = 24;
pub const DEFAULT_HD_PERIODS: usize = 2;
pub const DEFAULT_HD_ROWS: usize = 100;
pub const DEFAULT_ANCHOR_LENGTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    /// Visible range.
    #[default]
    Vrvp,
    /// Session.
    Svp,
    /// Session, high definition for the most recent sessions.
    SvpHd,
    /// Periodic.
    Pvp,
    /// Auto anchored.
    Aavp,
    /// Fixed range.
    Vpfr,
}

impl VariantKind {
    pub fn default_debounce_ms(self) -> u64 {
        match self {
            Self::Vpfr => 50,
            Self::Vrvp | Self::Aavp => 100,
            Self::Svp | Self::SvpHd | Self::Pvp => 150,
        }
    }

    /// How long fetched bars stay fresh for this variant.
    pub fn cache_ttl(self) -> Duration {
        match self {
            Self::Vrvp | Self::Aavp | Self::Vpfr => Duration::from_secs(5 * 60),
            Self::Svp | Self::SvpHd | Self::Pvp => Duration::from_secs(10 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub start_time: i64,
    pub end_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedProfile {
    pub profile: VolumeProfile,
    /// `None` spans the full visible chart width.
    pub bounds: Option<TimeBounds>,
}

/// Everything handed to the renderer. `style` is opaque to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSet<S> {
    pub profiles: Vec<PlacedProfile>,
    pub style: S,
    pub error: Option<String>,
}

impl<S> ProfileSet<S> {
    pub fn ready(profiles: Vec<PlacedProfile>, style: S) -> Self {
        Self {
            profiles,
            style,
            error: None,
        }
    }

    /// An error never travels with profiles.
    pub fn failed(message: impl Into<String>, style: S) -> Self {
        Self {
            profiles: Vec::new(),
            style,
            error: Some(message.into()),
        }
    }

    pub fn from_result(result: Result<Vec<PlacedProfile>, String>, style: S) -> Self {
        match result {
            Ok(profiles) => Self::ready(profiles, style),
            Err(message) => Self::failed(message, style),
        }
    }
}

/// Engine-side knobs for one variant instance.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantParams {
    pub kind: VariantKind,
    pub settings: ProfileSettings,
    /// The chart's bar resolution.
    pub display: Timeframe,
    /// Period used by `Pvp`; session variants always use `Session`.
    pub period: PeriodType,
    pub max_total_rows: usize,
    pub rows_per_period: usize,
    pub hd_periods: usize,
    pub hd_rows: usize,
    pub anchor_mode: AnchorMode,
    pub anchor_length: usize,
    pub clock: PeriodClock,
}

impl VariantParams {
    pub fn new(kind: VariantKind, display: Timeframe) -> Self {
        Self {
            kind,
            settings: ProfileSettings::default(),
            display,
            period: PeriodType::Session,
            max_total_rows: DEFAULT_MAX_TOTAL_ROWS,
            rows_per_period: DEFAULT_ROWS_PER_PERIOD,
            hd_periods: DEFAULT_HD_PERIODS,
            hd_rows: DEFAULT_HD_ROWS,
            anchor_mode: AnchorMode::Auto,
            anchor_length: DEFAULT_ANCHOR_LENGTH,
            clock: PeriodClock::utc(),
        }
    }

    pub fn period_type(&self) -> PeriodType {
        match self.kind {
            VariantKind::Pvp => self.period,
            _ => PeriodType::Session,
        }
    }

    pub fn row_budget(&self) -> RowBudget {
        match self.kind {
            VariantKind::SvpHd => RowBudget::Variable {
                recent_periods: self.hd_periods,
                recent_rows: self.hd_rows,
                older_rows: self.rows_per_period,
            },
            _ => RowBudget::Fixed(self.rows_per_period),
        }
    }
}

/// Bars and context for one computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileInputs<'a> {
    pub bars: &'a [Bar],
    /// Resolution of `bars`.
    pub resolution: Option<Timeframe>,
    /// Falls back to the whole series when absent.
    pub window: Option<VisibleWindow>,
    /// The picked `(start, end)` for `Vpfr`.
    pub fixed_range: Option<(i64, i64)>,
    /// Finer bars for the up/down split.
    pub intrabar: Option<&'a [Bar]>,
}

/// Runs the variant in `params` over `inputs`.
pub fn compute_profiles(params: &VariantParams, inputs: &ProfileInputs<'_>) -> Vec<PlacedProfile> {
    let bars = ascending(inputs.bars);
    let Some(window) = inputs.window.or_else(|| whole_series(&bars)) else {
        debug!(kind = ?params.kind, "no window, nothing to profile");
        return Vec::new();
    };
    let visible = slice_between(&bars, window.from_time, window.to_time.saturating_add(params.display.seconds()));

    let placed = match params.kind {
        VariantKind::Vrvp => vec![PlacedProfile {
            profile: build(params, &params.settings, visible, inputs),
            bounds: None,
        }],
        VariantKind::Svp | VariantKind::SvpHd | VariantKind::Pvp => {
            split_into_periods(
                visible,
                params.period_type(),
                params.max_total_rows,
                params.row_budget(),
                &params.clock,
            )
            .into_iter()
            .map(|period| {
                let settings = ProfileSettings {
                    num_rows: period.rows,
                    ..params.settings
                };
                PlacedProfile {
                    profile: build(params, &settings, period.bars, inputs),
                    bounds: Some(TimeBounds {
                        start_time: period.start_time,
                        end_time: period.end_time,
                    }),
                }
            })
            .collect()
        }
        VariantKind::Aavp => {
            let anchor = resolve_anchor(
                params.anchor_mode,
                visible,
                &window,
                params.display,
                params.anchor_length,
            );
            debug!(anchor = anchor.anchor_time, mode = %params.anchor_mode, "anchored profile");
            let anchored = slice_between(visible, anchor.anchor_time, i64::MAX);
            vec![PlacedProfile {
                profile: build(params, &params.settings, anchored, inputs),
                bounds: Some(TimeBounds {
                    start_time: anchor.anchor_time,
                    end_time: window.to_time,
                }),
            }]
        }
        VariantKind::Vpfr => match inputs.fixed_range {
            Some((start, end)) => {
                let picked = slice_between(&bars, start, end.saturating_add(params.display.seconds()));
                vec![PlacedProfile {
                    profile: build(params, &params.settings, picked, inputs),
                    bounds: Some(TimeBounds {
                        start_time: start,
                        end_time: end,
                    }),
                }]
            }
            None => Vec::new(),
        },
    };

    placed.into_iter().filter(|p| !p.profile.is_empty()).collect()
}

fn build(
    params: &VariantParams,
    settings: &ProfileSettings,
    bars: &[Bar],
    inputs: &ProfileInputs<'_>,
) -> VolumeProfile {
    let settings = match settings.rows_layout {
        // rows come from the span; the period row count only sizes the budget
        RowsLayout::TicksPerRow => params.settings,
        RowsLayout::NumberOfRows => *settings,
    };
    let mut req = ProfileRequest::new(bars, settings);
    if let (Some(sub), Some(resolution)) = (inputs.intrabar, inputs.resolution) {
        req = req.with_intrabar(sub, resolution);
    }
    build_profile(&req)
}

/// Bars with `start <= time < end` of an ascending series.
fn slice_between(bars: &[Bar], start: i64, end: i64) -> &[Bar] {
    let lo = bars.partition_point(|b| b.time < start);
    let hi = bars.partition_point(|b| b.time < end).max(lo);
    &bars[lo..hi]
}

fn whole_series(bars: &[Bar]) -> Option<VisibleWindow> {
    let last = bars.len().checked_sub(1)?;
    resolve_window(LogicalRange::new(0.0, last as f64), bars)
}
