//! The narrow slice of a chart's API the engine consumes.
//!
//! A [`Viewport`] reports its visible logical range (fractional bar-index
//! bounds) and notifies subscribers when it changes. [`ManualViewport`] is the
//! in-process implementation used by the CLI and tests; adapters for a real
//! charting library implement the same trait.

use std::{cell::RefCell, rc::Rc};

use serde::{Deserialize, Serialize};

/// Fractional bar-index bounds of the visible area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogicalRange {
    pub from: f64,
    pub to: f64,
}

impl LogicalRange {
    pub fn new(from: f64, to: f64) -> Self {
        Self { from, to }
    }
}

pub type RangeHandler = Box<dyn FnMut(Option<LogicalRange>)>;

pub trait Viewport {
    /// `None` while the chart has not laid out any bars yet.
    fn visible_logical_range(&self) -> Option<LogicalRange>;

    /// Registers `handler` for range changes until the returned guard is dropped.
    fn on_range_change(&self, handler: RangeHandler) -> Subscription;
}

/// Unsubscribes when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

#[derive(Default)]
struct ViewportState {
    range: Option<LogicalRange>,
    next_id: u64,
    handlers: Vec<(u64, RangeHandler)>,
}

/// A viewport whose range is set programmatically.
#[derive(Clone, Default)]
pub struct ManualViewport {
    state: Rc<RefCell<ViewportState>>,
}

impl ManualViewport {
    pub fn new(range: Option<LogicalRange>) -> Self {
        let viewport = Self::default();
        viewport.state.borrow_mut().range = range;
        viewport
    }

    /// Updates the range and notifies every subscriber.
    pub fn set_range(&self, range: Option<LogicalRange>) {
        let mut handlers = {
            let mut state = self.state.borrow_mut();
            state.range = range;
            std::mem::take(&mut state.handlers)
        };
        for (_, handler) in handlers.iter_mut() {
            handler(range);
        }
        let mut state = self.state.borrow_mut();
        handlers.append(&mut state.handlers);
        state.handlers = handlers;
    }

    /// Updates the range without notifying anyone, as a chart does while its
    /// series is still loading.
    pub fn set_range_silently(&self, range: Option<LogicalRange>) {
        self.state.borrow_mut().range = range;
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.borrow().handlers.len()
    }
}

impl Viewport for ManualViewport {
    fn visible_logical_range(&self) -> Option<LogicalRange> {
        self.state.borrow().range
    }

    fn on_range_change(&self, handler: RangeHandler) -> Subscription {
        let id = {
            let mut state = self.state.borrow_mut();
            state.next_id += 1;
            let id = state.next_id;
            state.handlers.push((id, handler));
            id
        };
        let weak = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state.borrow_mut().handlers.retain(|(h, _)| *h != id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn handlers_see_updates_until_guard_drops() {
        let viewport = ManualViewport::new(None);
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        let sub = viewport.on_range_change(Box::new(move |_| counter.set(counter.get() + 1)));

        viewport.set_range(Some(LogicalRange::new(0.0, 10.0)));
        assert_eq!(seen.get(), 1);

        drop(sub);
        assert_eq!(viewport.subscriber_count(), 0);
        viewport.set_range(Some(LogicalRange::new(1.0, 11.0)));
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn silent_update_is_visible_but_not_broadcast() {
        let viewport = ManualViewport::new(None);
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        let _sub = viewport.on_range_change(Box::new(move |_| counter.set(counter.get() + 1)));

        viewport.set_range_silently(Some(LogicalRange::new(2.0, 4.0)));
        assert_eq!(seen.get(), 0);
        assert_eq!(
            viewport.visible_logical_range(),
            Some(LogicalRange::new(2.0, 4.0))
        );
    }
}
