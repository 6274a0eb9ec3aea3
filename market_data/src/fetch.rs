//! Cache-aware, cancellable fetch coordination.
//!
//! A [`FetchCoordinator`] sits between the engine and a [`DataProvider`]:
//! - a request whose [`CacheKey`] is fresh in the caller's [`BarCache`] never
//!   reaches the provider;
//! - issuing a request with different parameters, even one answered from the
//!   cache, aborts every request still in flight; an aborted call resolves to
//!   [`FetchOutcome::Superseded`] so its stale bars are never applied;
//! - provider errors collapse to a message string, the only failure signal the
//!   rendering side understands.

use std::{
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use futures::future::{AbortHandle, AbortRegistration, Abortable};
use tracing::{debug, warn};

use crate::{
    cache::{BarCache, CacheKey},
    models::{
        bar::{Bar, BarSeries},
        request_params::BarsRequestParams,
    },
    providers::DataProvider,
};

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Ready(Arc<[Bar]>),
    Failed(String),
    /// A newer request replaced this one before it resolved.
    Superseded,
}

impl FetchOutcome {
    pub fn bars(&self) -> Option<&Arc<[Bar]>> {
        match self {
            Self::Ready(bars) => Some(bars),
            _ => None,
        }
    }
}

struct InFlight {
    generation: u64,
    params: BarsRequestParams,
    handle: AbortHandle,
}

pub struct FetchCoordinator<P: ?Sized> {
    provider: Arc<P>,
    in_flight: Mutex<Vec<InFlight>>,
    generation: AtomicU64,
}

impl<P: DataProvider + ?Sized> FetchCoordinator<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            in_flight: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Fetches through `cache`, aborting every in-flight request with other
    /// parameters. A cache hit supersedes them too.
    pub async fn fetch(&self, cache: &BarCache, params: BarsRequestParams) -> FetchOutcome {
        let key = CacheKey::from(&params);
        if let Some(bars) = cache.get(&key, Instant::now()) {
            self.supersede(&params);
            return FetchOutcome::Ready(bars);
        }

        let (generation, registration) = self.register(&params);
        let result = Abortable::new(self.provider.fetch_bars(params), registration).await;
        self.release(generation);

        match result {
            Err(_aborted) => FetchOutcome::Superseded,
            Ok(Err(e)) => {
                warn!(error = %e, "bar fetch failed");
                FetchOutcome::Failed(e.to_string())
            }
            Ok(Ok(series)) => {
                let series = BarSeries::new(series.symbol, series.timeframe, series.bars);
                let bars: Arc<[Bar]> = Arc::from(series.bars);
                cache.insert(key, Arc::clone(&bars), Instant::now());
                FetchOutcome::Ready(bars)
            }
        }
    }

    /// Aborts whatever is in flight, e.g. when the chart is torn down.
    pub fn cancel(&self) {
        for previous in self.slots().drain(..) {
            previous.handle.abort();
        }
    }

    fn slots(&self) -> MutexGuard<'_, Vec<InFlight>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Aborts and forgets every in-flight request whose parameters differ from `params`.
    fn supersede_locked(slots: &mut Vec<InFlight>, params: &BarsRequestParams) {
        slots.retain(|f| {
            if f.params == *params {
                return true;
            }
            debug!(symbol = %f.params.symbol, "aborting superseded fetch");
            f.handle.abort();
            false
        });
    }

    fn supersede(&self, params: &BarsRequestParams) {
        Self::supersede_locked(&mut self.slots(), params);
    }

    fn register(&self, params: &BarsRequestParams) -> (u64, AbortRegistration) {
        let (handle, registration) = AbortHandle::new_pair();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let mut slots = self.slots();
        Self::supersede_locked(&mut slots, params);
        slots.push(InFlight {
            generation,
            params: params.clone(),
            handle,
        });
        (generation, registration)
    }

    fn release(&self, generation: u64) {
        self.slots().retain(|f| f.generation != generation);
    }
}
