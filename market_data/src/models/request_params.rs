use serde::{Deserialize, Serialize};

use crate::models::{asset::AssetClass, timeframe::Timeframe};

/// Universal parameters for requesting bars from any [`DataProvider`](crate::providers::DataProvider).
///
/// Validation of the resolution against what a source actually serves is left to
/// each provider implementation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarsRequestParams {
    /// Symbol to request (e.g. `"AAPL"`, `"ESU24"`).
    pub symbol: String,

    /// Bar resolution to fetch.
    pub resolution: Timeframe,

    /// Start of the requested range, UTC seconds (inclusive).
    pub start: i64,

    /// End of the requested range, UTC seconds (exclusive).
    pub end: i64,

    #[serde(default)]
    pub asset_class: AssetClass,
}

impl BarsRequestParams {
    pub fn new(symbol: impl Into<String>, resolution: Timeframe, start: i64, end: i64) -> Self {
        Self {
            symbol: symbol.into(),
            resolution,
            start,
            end,
            asset_class: AssetClass::default(),
        }
    }

    pub fn with_asset_class(mut self, asset_class: AssetClass) -> Self {
        self.asset_class = asset_class;
        self
    }
}
