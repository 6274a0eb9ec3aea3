//! Two-click range selection for fixed-range profiles.

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnchorState {
    #[default]
    Idle,
    AwaitingFirstAnchor,
    AwaitingSecondAnchor {
        first: i64,
    },
    /// `start <= end`.
    Anchored {
        start: i64,
        end: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorEvent {
    /// Begin (or restart) picking a range.
    Arm,
    PointSelected(i64),
    Reset,
}

impl AnchorState {
    /// The transition table. Points selected while not armed are ignored.
    pub fn next(self, event: AnchorEvent) -> Self {
        use AnchorEvent::*;
        use AnchorState::*;

        match (self, event) {
            (_, Reset) => Idle,
            (_, Arm) => AwaitingFirstAnchor,
            (AwaitingFirstAnchor, PointSelected(t)) => AwaitingSecondAnchor { first: t },
            (AwaitingSecondAnchor { first }, PointSelected(t)) => Anchored {
                start: first.min(t),
                end: first.max(t),
            },
            (state @ (Idle | Anchored { .. }), PointSelected(_)) => state,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorStateMachine {
    state: AnchorState,
}

impl AnchorStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a machine that already has a range, e.g. from saved settings.
    pub fn anchored(t1: i64, t2: i64) -> Self {
        Self {
            state: AnchorState::Anchored {
                start: t1.min(t2),
                end: t1.max(t2),
            },
        }
    }

    pub fn state(&self) -> AnchorState {
        self.state
    }

    pub fn handle(&mut self, event: AnchorEvent) -> AnchorState {
        let next = self.state.next(event);
        if next != self.state {
            debug!(from = ?self.state, to = ?next, ?event, "fixed range anchor transition");
        }
        self.state = next;
        next
    }

    /// `(start, end)` once both points are chosen.
    pub fn range(&self) -> Option<(i64, i64)> {
        match self.state {
            AnchorState::Anchored { start, end } => Some((start, end)),
            _ => None,
        }
    }
}
