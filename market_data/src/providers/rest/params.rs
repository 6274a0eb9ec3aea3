use snafu::ensure;

use crate::{
    models::{request_params::BarsRequestParams, timeframe::Timeframe},
    providers::{ProviderError, ValidationSnafu},
    time::to_rfc3339,
};

/// Resolutions a plain equity feed serves.
pub const DEFAULT_SERVED: &[Timeframe] = &[
    Timeframe::FIVE_MINUTES,
    Timeframe::ONE_HOUR,
    Timeframe::ONE_DAY,
];

/// Futures and spread feeds serve a wider set.
pub const FUTURES_SERVED: &[Timeframe] = &[
    Timeframe::ONE_MINUTE,
    Timeframe::FIVE_MINUTES,
    Timeframe::FIFTEEN_MINUTES,
    Timeframe::ONE_HOUR,
    Timeframe::ONE_DAY,
];

/// Resolutions the source serves for the request's asset class.
pub fn served_resolutions(params: &BarsRequestParams) -> &'static [Timeframe] {
    if params.asset_class.is_futures_or_spread() {
        FUTURES_SERVED
    } else {
        DEFAULT_SERVED
    }
}

pub fn validate_params(params: &BarsRequestParams) -> Result<(), ProviderError> {
    ensure!(
        !params.symbol.trim().is_empty(),
        ValidationSnafu {
            message: "symbol must not be empty"
        }
    );
    ensure!(
        params.start < params.end,
        ValidationSnafu {
            message: format!("start {} must precede end {}", params.start, params.end)
        }
    );
    ensure!(
        served_resolutions(params).contains(&params.resolution),
        ValidationSnafu {
            message: format!("resolution {} is not served", params.resolution)
        }
    );
    Ok(())
}

/// Builds the query string pairs for `GET {base}/bars`.
pub fn construct_params(params: &BarsRequestParams) -> Result<Vec<(String, String)>, ProviderError> {
    let rfc = |secs: i64| {
        to_rfc3339(secs).map_err(|e| {
            ValidationSnafu {
                message: e.to_string(),
            }
            .build()
        })
    };
    Ok(vec![
        ("symbol".to_string(), params.symbol.trim().to_string()),
        ("resolution".to_string(), params.resolution.to_string()),
        ("start".to_string(), rfc(params.start)?),
        ("end".to_string(), rfc(params.end)?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::asset::AssetClass;

    #[test]
    fn query_uses_rfc3339_and_display_resolution() {
        let p = BarsRequestParams::new("AAPL", Timeframe::FIVE_MINUTES, 1_704_153_600, 1_704_240_000);
        let q = construct_params(&p).unwrap();
        assert_eq!(q[1], ("resolution".to_string(), "5m".to_string()));
        assert_eq!(q[2].1, "2024-01-02T00:00:00Z");
    }

    #[test]
    fn inverted_range_is_rejected() {
        let p = BarsRequestParams::new("AAPL", Timeframe::ONE_HOUR, 10, 5);
        assert!(matches!(
            validate_params(&p),
            Err(ProviderError::Validation { .. })
        ));
    }

    #[test]
    fn one_minute_only_for_futures() {
        let p = BarsRequestParams::new("ES", Timeframe::ONE_MINUTE, 0, 60);
        assert!(validate_params(&p).is_err());
        let p = p.with_asset_class(AssetClass::Futures);
        assert!(validate_params(&p).is_ok());
    }
}
