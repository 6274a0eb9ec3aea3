//! Visible-window tracking.
//!
//! [`resolve_window`] turns a logical range into a [`VisibleWindow`] over a bar
//! series. [`WindowTracker`] keeps one up to date for a [`Viewport`]: raw range
//! events are debounced on a [`Scheduler`], one extra re-check runs
//! [`LOAD_RACE_RETRY_MS`] after attaching (the chart may report no range until
//! its series has loaded), and a window equal to the last emitted one is
//! swallowed.

use std::{cell::Cell, rc::Rc, sync::Arc};

use market_data::Bar;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    scheduler::{Scheduler, TimerId},
    viewport::{LogicalRange, Subscription, Viewport},
};

/// Delay of the single re-check scheduled when a tracker attaches.
pub const LOAD_RACE_RETRY_MS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibleWindow {
    pub from_time: i64,
    pub to_time: i64,
    pub from_index: usize,
    pub to_index: usize,
    pub bars_in_window: usize,
    pub price_min: f64,
    pub price_max: f64,
}

impl VisibleWindow {
    pub fn is_valid(&self) -> bool {
        self.from_time > 0 && self.to_time > self.from_time && self.bars_in_window > 0
    }

    /// Fields that decide whether a recomputation is needed downstream.
    pub fn fingerprint(&self) -> (i64, i64, usize) {
        (self.from_time, self.to_time, self.bars_in_window)
    }
}

/// Clamps `range` onto `bars` (ascending) and reads off times and price extents.
///
/// `None` when there are no bars, the range is inverted or non-finite, lies
/// entirely off one side of the series, or maps to non-positive times.
pub fn resolve_window(range: LogicalRange, bars: &[Bar]) -> Option<VisibleWindow> {
    let last = bars.len().checked_sub(1)?;
    if !range.from.is_finite() || !range.to.is_finite() || range.from > range.to {
        return None;
    }
    if range.to < 0.0 || range.from > last as f64 {
        return None;
    }

    let from_index = (range.from.floor().max(0.0) as usize).min(last);
    let to_index = (range.to.ceil().max(0.0) as usize).min(last);

    let (mut from_time, mut to_time) = (bars[from_index].time, bars[to_index].time);
    if from_time > to_time {
        std::mem::swap(&mut from_time, &mut to_time);
    }
    if from_time <= 0 || to_time <= 0 {
        return None;
    }

    let span = &bars[from_index..=to_index];
    let price_min = span.iter().map(|b| b.low).filter(|p| p.is_finite()).reduce(f64::min);
    let price_max = span.iter().map(|b| b.high).filter(|p| p.is_finite()).reduce(f64::max);

    Some(VisibleWindow {
        from_time,
        to_time,
        from_index,
        to_index,
        bars_in_window: to_index - from_index + 1,
        price_min: price_min.unwrap_or(0.0),
        price_max: price_max.unwrap_or(0.0),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerOptions {
    pub debounce_ms: u64,
    pub enabled: bool,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            enabled: true,
        }
    }
}

/// State shared with scheduled tasks and the viewport handler.
#[derive(Default)]
struct Signals {
    debounce: Cell<Option<TimerId>>,
    due: Cell<bool>,
}

impl Signals {
    fn restart_debounce(self: &Rc<Self>, scheduler: &Scheduler, debounce_ms: u64) {
        if let Some(id) = self.debounce.take() {
            scheduler.cancel(id);
        }
        let signals = Rc::clone(self);
        let id = scheduler.schedule(debounce_ms, move || {
            signals.debounce.set(None);
            signals.due.set(true);
        });
        self.debounce.set(Some(id));
    }
}

pub struct WindowTracker<V: Viewport> {
    viewport: V,
    bars: Arc<[Bar]>,
    options: TrackerOptions,
    scheduler: Scheduler,
    signals: Rc<Signals>,
    current: Option<VisibleWindow>,
    _subscription: Option<Subscription>,
}

impl<V: Viewport> WindowTracker<V> {
    /// Attaches to `viewport`. Nothing is emitted until the scheduler advances.
    pub fn new(viewport: V, bars: Arc<[Bar]>, options: TrackerOptions, scheduler: Scheduler) -> Self {
        let signals = Rc::new(Signals::default());
        let subscription = options.enabled.then(|| {
            let handler_signals = Rc::clone(&signals);
            let handler_scheduler = scheduler.clone();
            let debounce_ms = options.debounce_ms;
            let sub = viewport.on_range_change(Box::new(move |_| {
                handler_signals.restart_debounce(&handler_scheduler, debounce_ms);
            }));

            signals.restart_debounce(&scheduler, debounce_ms);
            let retry_signals = Rc::clone(&signals);
            scheduler.schedule(LOAD_RACE_RETRY_MS, move || retry_signals.due.set(true));
            sub
        });

        Self {
            viewport,
            bars,
            options,
            scheduler,
            signals,
            current: None,
            _subscription: subscription,
        }
    }

    /// Replaces the series; the window is recomputed after the debounce.
    pub fn set_bars(&mut self, bars: Arc<[Bar]>) {
        self.bars = bars;
        if self.options.enabled {
            self.signals.restart_debounce(&self.scheduler, self.options.debounce_ms);
        }
    }

    pub fn current(&self) -> Option<&VisibleWindow> {
        self.current.as_ref()
    }

    pub fn bars(&self) -> &Arc<[Bar]> {
        &self.bars
    }

    /// Returns a window if a re-check came due since the last poll and produced
    /// a valid window different from the last one emitted.
    pub fn poll(&mut self) -> Option<VisibleWindow> {
        if !self.options.enabled || !self.signals.due.replace(false) {
            return None;
        }
        let Some(range) = self.viewport.visible_logical_range() else {
            trace!("viewport has no range yet");
            return None;
        };
        let window = resolve_window(range, &self.bars).filter(VisibleWindow::is_valid)?;
        if self.current.is_some_and(|c| c.fingerprint() == window.fingerprint()) {
            trace!("window unchanged");
            return None;
        }
        debug!(
            from = window.from_time,
            to = window.to_time,
            bars = window.bars_in_window,
            "visible window changed"
        );
        self.current = Some(window);
        Some(window)
    }
}
