//! Provider abstraction for bar data sources.
//!
//! [`DataProvider`] is the one suspension point of the volume profile pipeline:
//! everything downstream of it is synchronous. Each concrete source implements
//! it to handle its own transport, payload shape and validation.
//!
//! The trait is async and object safe so callers can select a provider at runtime
//! (`Box<dyn DataProvider>` / `Arc<dyn DataProvider>`).
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data::{BarSeries, BarsRequestParams};
//! use market_data::providers::{DataProvider, ProviderError};
//!
//! struct Empty;
//!
//! #[async_trait]
//! impl DataProvider for Empty {
//!     async fn fetch_bars(&self, params: BarsRequestParams) -> Result<BarSeries, ProviderError> {
//!         Ok(BarSeries::new(params.symbol, params.resolution, vec![]))
//!     }
//! }
//! ```

pub mod rest;

use async_trait::async_trait;
use shared_utils::EnvError;
use snafu::{Backtrace, Snafu};

use crate::models::{bar::BarSeries, request_params::BarsRequestParams};

/// Trait for fetching time-series bar data from a market data source.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches bars for one symbol over `[params.start, params.end)`.
    ///
    /// Implementations return bars in ascending time order.
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<BarSeries, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Environment error: {source}"))]
    Env {
        source: EnvError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },

    /// Rate limit must allow at least one request per second.
    #[snafu(display("Invalid rate limit: {per_second} requests/s"))]
    InvalidRateLimit { per_second: u32 },
}

/// Errors that can occur within a `DataProvider` implementation.
///
/// Callers downstream of the fetch only ever see these as strings
/// (`ProfileSet::error`), so the display text is the user-facing message.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The source returned an `error` field or a non-success status.
    #[snafu(display("API error: {message}"))]
    Api {
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// The payload parsed as JSON but its rows could not be interpreted.
    #[snafu(display("Malformed payload: {message}"))]
    Malformed {
        message: String,
        backtrace: Backtrace,
    },
}
