use serde::{Deserialize, Serialize};

/// Instrument family; decides which LTF ladder and served resolutions apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    #[default]
    UsEquity,
    Futures,
    Spread,
    Crypto,
}

impl AssetClass {
    pub fn is_futures_or_spread(self) -> bool {
        matches!(self, Self::Futures | Self::Spread)
    }
}
