//! Window-to-profiles refresh: pick the LTF, fetch through the cache, compute.

use std::sync::Arc;

use market_data::{
    AssetClass, BarCache, BarsRequestParams, FetchCoordinator, FetchOutcome, Timeframe,
    providers::DataProvider,
};
use tracing::{debug, info, warn};

use crate::{
    ltf::{LtfSelection, finer_served},
    variants::{ProfileInputs, ProfileSet, VariantParams, compute_profiles},
    window::VisibleWindow,
};

pub struct ProfilePipeline<P: ?Sized> {
    symbol: String,
    asset_class: AssetClass,
    params: VariantParams,
    ltf: LtfSelection,
    intrabar: bool,
    coordinator: FetchCoordinator<P>,
}

impl<P: DataProvider + ?Sized> ProfilePipeline<P> {
    pub fn new(provider: Arc<P>, symbol: impl Into<String>, params: VariantParams) -> Self {
        Self {
            symbol: symbol.into(),
            asset_class: AssetClass::default(),
            params,
            ltf: LtfSelection::Auto,
            intrabar: false,
            coordinator: FetchCoordinator::new(provider),
        }
    }

    pub fn with_asset_class(mut self, asset_class: AssetClass) -> Self {
        self.asset_class = asset_class;
        self
    }

    pub fn with_ltf(mut self, ltf: LtfSelection) -> Self {
        self.ltf = ltf;
        self
    }

    /// Also fetch the next finer served resolution to classify volume.
    pub fn with_intrabar(mut self, enabled: bool) -> Self {
        self.intrabar = enabled;
        self
    }

    pub fn params(&self) -> &VariantParams {
        &self.params
    }

    /// The fetch for `window`, extended to cover a picked fixed range.
    pub fn request_for(&self, window: &VisibleWindow, fixed_range: Option<(i64, i64)>) -> BarsRequestParams {
        let (mut start, mut end) = (window.from_time, window.to_time);
        if let Some((a, b)) = fixed_range {
            start = start.min(a);
            end = end.max(b);
        }
        let end = end.saturating_add(self.params.display.seconds());
        let futures = self.asset_class.is_futures_or_spread();
        let resolution = self.ltf.resolve(start, end, self.params.display, futures);
        BarsRequestParams::new(self.symbol.clone(), resolution, start, end).with_asset_class(self.asset_class)
    }

    /// Recomputes the profile set for `window`.
    ///
    /// `None` means a newer refresh superseded this one and its result must be
    /// discarded. Fetch failures come back as a set with `error` filled.
    pub async fn refresh<S>(
        &self,
        cache: &BarCache,
        window: &VisibleWindow,
        fixed_range: Option<(i64, i64)>,
        style: S,
    ) -> Option<ProfileSet<S>> {
        let request = self.request_for(window, fixed_range);
        let resolution = request.resolution;
        info!(symbol = %request.symbol, %resolution, kind = ?self.params.kind, "refreshing profiles");

        let bars = match self.coordinator.fetch(cache, request.clone()).await {
            FetchOutcome::Ready(bars) => bars,
            FetchOutcome::Failed(message) => return Some(ProfileSet::failed(message, style)),
            FetchOutcome::Superseded => return None,
        };

        let intrabar = match self.intrabar_resolution(resolution) {
            Some(finer) => {
                let sub_request = BarsRequestParams {
                    resolution: finer,
                    ..request
                };
                match self.coordinator.fetch(cache, sub_request).await {
                    FetchOutcome::Ready(sub) => Some(sub),
                    FetchOutcome::Failed(message) => {
                        warn!(%finer, error = %message, "intrabar data unavailable, using whole-bar split");
                        None
                    }
                    FetchOutcome::Superseded => return None,
                }
            }
            None => None,
        };

        let inputs = ProfileInputs {
            bars: &bars,
            resolution: Some(resolution),
            window: Some(*window),
            fixed_range,
            intrabar: intrabar.as_deref(),
        };
        let profiles = compute_profiles(&self.params, &inputs);
        debug!(profiles = profiles.len(), "profiles computed");
        Some(ProfileSet::ready(profiles, style))
    }

    fn intrabar_resolution(&self, ltf: Timeframe) -> Option<Timeframe> {
        if !self.intrabar {
            return None;
        }
        finer_served(ltf, self.asset_class.is_futures_or_spread())
    }
}
