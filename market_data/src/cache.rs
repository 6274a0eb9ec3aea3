//! Read-mostly TTL cache for fetched bar series.
//!
//! Readers call [`BarCache::get`], which loads an `Arc<HashMap<..>>` snapshot with
//! no lock contention. Writers swap in a new snapshot (`arc-swap` RCU), so a
//! reader sees either the old or the new map, never a torn one.
//!
//! The cache is an explicit component: whoever drives the fetches owns it and
//! hands it out by reference. Nothing here is global, so tests and chart
//! instances never observe each other's entries.
//!
//! Values are `Arc<[Bar]>`; a hit hands back the very allocation the original
//! miss stored, so cached and uncached paths cannot diverge within the TTL.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use arc_swap::ArcSwap;
use tracing::debug;

use crate::models::{bar::Bar, request_params::BarsRequestParams, timeframe::Timeframe};

/// `(symbol, range, resolution)` fingerprint of a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub start: i64,
    pub end: i64,
    pub resolution: Timeframe,
}

impl From<&BarsRequestParams> for CacheKey {
    fn from(p: &BarsRequestParams) -> Self {
        Self {
            symbol: p.symbol.trim().to_string(),
            start: p.start,
            end: p.end,
            resolution: p.resolution,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    bars: Arc<[Bar]>,
    inserted_at: Instant,
}

type Snapshot = HashMap<CacheKey, Entry>;

#[derive(Debug)]
pub struct BarCache {
    ttl: Duration,
    entries: ArcSwap<Snapshot>,
}

impl BarCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: ArcSwap::from_pointee(Snapshot::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached bars if the entry is younger than the TTL at `now`.
    pub fn get(&self, key: &CacheKey, now: Instant) -> Option<Arc<[Bar]>> {
        let snap = self.entries.load();
        let hit = snap
            .get(key)
            .filter(|e| now.saturating_duration_since(e.inserted_at) < self.ttl)
            .map(|e| Arc::clone(&e.bars));
        debug!(symbol = %key.symbol, resolution = %key.resolution, hit = hit.is_some(), "bar cache lookup");
        hit
    }

    pub fn insert(&self, key: CacheKey, bars: Arc<[Bar]>, now: Instant) {
        let entry = Entry {
            bars,
            inserted_at: now,
        };
        self.entries.rcu(|current| {
            let mut next = Snapshot::clone(current);
            next.insert(key.clone(), entry.clone());
            next
        });
    }

    /// Drops every entry older than the TTL; returns how many were removed.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let ttl = self.ttl;
        let previous = self.entries.rcu(|current| {
            current
                .iter()
                .filter(|(_, e)| now.saturating_duration_since(e.inserted_at) < ttl)
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect::<Snapshot>()
        });
        let remaining = self.entries.load().len();
        previous.len().saturating_sub(remaining)
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.store(Arc::new(Snapshot::new()));
    }
}
