//! Market data model and bar feed for the volume profile engine.
//!
//! - [`models`]: the vendor-agnostic [`Bar`](models::bar::Bar), [`Timeframe`](models::timeframe::Timeframe)
//!   and request parameters.
//! - [`time`]: timestamp normalization shared by every provider.
//! - [`providers`]: the [`DataProvider`](providers::DataProvider) seam and the REST implementation.
//! - [`cache`]: caller-owned TTL cache for fetched bar series.
//! - [`fetch`]: cache-aware, cancellable fetch coordination.

pub mod cache;
pub mod errors;
pub mod fetch;
pub mod models;
pub mod providers;
pub mod time;

pub use cache::{BarCache, CacheKey};
pub use errors::Error;
pub use fetch::{FetchCoordinator, FetchOutcome};
pub use models::{
    asset::AssetClass,
    bar::{Bar, BarSeries, ascending},
    request_params::BarsRequestParams,
    timeframe::{Timeframe, TimeframeError, TimeframeUnit},
};
