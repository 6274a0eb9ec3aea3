//! Volume profile engine.
//!
//! Leaf-first:
//! - [`scheduler`], [`viewport`]: the cooperative timer queue and the chart seam.
//! - [`window`]: visible-window resolution and the debounced [`WindowTracker`](window::WindowTracker).
//! - [`ltf`]: which lower timeframe to fetch for a visible range.
//! - [`period`], [`splitter`]: calendar periods and the row-budgeted splitter.
//! - [`anchor`], [`fixed_range`]: anchor resolution and the two-click range picker.
//! - [`profile`]: the volume-at-price histogram, POC and Value Area.
//! - [`variants`], [`pipeline`]: the six indicator variants and the fetch-to-profiles refresh.
//! - [`config`], [`logging`]: TOML configuration and subscriber setup for binaries.

pub mod anchor;
pub mod config;
pub mod fixed_range;
pub mod logging;
pub mod ltf;
pub mod period;
pub mod pipeline;
pub mod profile;
pub mod scheduler;
pub mod splitter;
pub mod variants;
pub mod viewport;
pub mod window;

pub use anchor::{AnchorMode, AnchorResult, resolve_anchor};
pub use config::{ConfigError, ProfileConfig, load_config_path, load_config_str};
pub use fixed_range::{AnchorEvent, AnchorState, AnchorStateMachine};
pub use ltf::{LtfSelection, select_ltf};
pub use period::{PeriodClock, PeriodType};
pub use pipeline::ProfilePipeline;
pub use profile::{Bin, ProfileRequest, ProfileSettings, RowsLayout, VolumeProfile, build_profile};
pub use scheduler::Scheduler;
pub use splitter::{PeriodBoundary, RowBudget, split_into_periods};
pub use variants::{
    PlacedProfile, ProfileInputs, ProfileSet, TimeBounds, VariantKind, VariantParams,
    compute_profiles,
};
pub use viewport::{LogicalRange, ManualViewport, Subscription, Viewport};
pub use window::{TrackerOptions, VisibleWindow, WindowTracker, resolve_window};
