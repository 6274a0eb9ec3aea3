use std::num::NonZeroU32;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::{get_env_parse_or, get_env_var, get_env_var_opt};
use snafu::{OptionExt, ResultExt};
use tracing::debug;

use crate::{
    models::{bar::BarSeries, request_params::BarsRequestParams},
    providers::{
        ApiSnafu, ClientBuildSnafu, DataProvider, EnvSnafu, InvalidApiKeySnafu,
        InvalidRateLimitSnafu, ProviderError, ProviderInitError, ReqwestSnafu,
        rest::{
            params::{construct_params, validate_params},
            response::{error_message, parse_payload},
        },
    },
};

pub const BASE_URL_ENV: &str = "VP_API_BASE_URL";
pub const API_KEY_ENV: &str = "VP_API_KEY";
pub const RATE_ENV: &str = "VP_API_RATE_PER_SEC";

const DEFAULT_RATE_PER_SEC: NonZeroU32 = nonzero!(5u32);

/// Connection settings for [`RestProvider`].
#[derive(Debug)]
pub struct RestConfig {
    /// Base URL; requests go to `{base_url}/bars`.
    pub base_url: String,
    /// Optional bearer token.
    pub api_key: Option<SecretString>,
    pub requests_per_second: NonZeroU32,
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            requests_per_second: DEFAULT_RATE_PER_SEC,
        }
    }

    /// Reads `VP_API_BASE_URL` (required), `VP_API_KEY` and `VP_API_RATE_PER_SEC`.
    pub fn from_env() -> Result<Self, ProviderInitError> {
        let base_url = get_env_var(BASE_URL_ENV).context(EnvSnafu)?;
        let api_key = get_env_var_opt(API_KEY_ENV).map(SecretString::from);
        let rate = get_env_parse_or(RATE_ENV, DEFAULT_RATE_PER_SEC.get()).context(EnvSnafu)?;
        let requests_per_second =
            NonZeroU32::new(rate).context(InvalidRateLimitSnafu { per_second: rate })?;
        Ok(Self {
            base_url,
            api_key,
            requests_per_second,
        })
    }
}

pub struct RestProvider {
    client: Client,
    bars_url: String,
    limiter: DefaultDirectRateLimiter,
}

impl RestProvider {
    pub fn new(config: RestConfig) -> Result<Self, ProviderInitError> {
        let mut headers = header::HeaderMap::new();
        if let Some(key) = &config.api_key {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", key.expose_secret()))
                .context(InvalidApiKeySnafu)?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            bars_url: format!("{}/bars", config.base_url.trim_end_matches('/')),
            limiter: RateLimiter::direct(Quota::per_second(config.requests_per_second)),
        })
    }

    pub fn from_env() -> Result<Self, ProviderInitError> {
        Self::new(RestConfig::from_env()?)
    }
}

#[async_trait]
impl DataProvider for RestProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<BarSeries, ProviderError> {
        validate_params(&params)?;
        let query = construct_params(&params)?;

        self.limiter.until_ready().await;
        debug!(symbol = %params.symbol, resolution = %params.resolution, "requesting bars");

        let response = self
            .client
            .get(&self.bars_url)
            .query(&query)
            .send()
            .await
            .context(ReqwestSnafu)?;

        let status = response.status();
        let body = response.text().await.context(ReqwestSnafu)?;

        if !status.is_success() {
            return ApiSnafu {
                message: error_message(status, &body),
            }
            .fail();
        }

        let bars = parse_payload(&body)?;
        Ok(BarSeries::new(params.symbol, params.resolution, bars))
    }
}
