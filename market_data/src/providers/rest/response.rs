use serde::Deserialize;

use crate::{
    models::bar::Bar,
    providers::{ApiSnafu, MalformedSnafu, ProviderError},
    time::{normalize_epoch, parse_iso_to_secs},
};

/// `t` is documented as ISO-8601, but some deployments send epoch numbers.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum RestTime {
    Iso(String),
    Epoch(i64),
}

#[derive(Deserialize, Debug)]
pub struct RestBar {
    pub t: RestTime,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    #[serde(default)]
    pub v: f64,
}

#[derive(Deserialize, Debug, Default)]
pub struct RestResponse {
    #[serde(default)]
    pub rows: Vec<RestBar>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RestResponse {
    /// Converts the payload into bars, surfacing the `error` field first.
    ///
    /// An error never comes back together with partial rows.
    pub fn into_bars(self) -> Result<Vec<Bar>, ProviderError> {
        if let Some(message) = self.error.filter(|m| !m.trim().is_empty()) {
            return ApiSnafu { message }.fail();
        }
        self.rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let time = match row.t {
                    RestTime::Iso(s) => parse_iso_to_secs(&s).map_err(|e| e.to_string()),
                    RestTime::Epoch(n) => Ok(normalize_epoch(n)),
                };
                let time = time.map_err(|message| {
                    MalformedSnafu {
                        message: format!("row {i}: {message}"),
                    }
                    .build()
                })?;
                Ok(Bar {
                    time,
                    open: row.o,
                    high: row.h,
                    low: row.l,
                    close: row.c,
                    volume: row.v,
                })
            })
            .collect()
    }
}

/// Parses a raw response body.
pub fn parse_payload(body: &str) -> Result<Vec<Bar>, ProviderError> {
    let response: RestResponse = serde_json::from_str(body)
        .map_err(|e| e.to_string())
        .map_err(|message| MalformedSnafu { message }.build())?;
    response.into_bars()
}

/// Pulls the `error` message out of a non-success body when there is one.
pub fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<RestResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_rows() {
        let body = r#"{"rows":[
            {"t":"2024-01-02T00:00:00Z","o":1,"h":2,"l":0.5,"c":1.5,"v":100},
            {"t":"2024-01-03T00:00:00Z","o":1.5,"h":2.5,"l":1,"c":2,"v":50}
        ]}"#;
        let bars = parse_payload(body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].time, 1_704_153_600);
        assert_eq!(bars[1].volume, 50.0);
    }

    #[test]
    fn epoch_millis_are_accepted() {
        let body = r#"{"rows":[{"t":1704153600000,"o":1,"h":1,"l":1,"c":1,"v":1}]}"#;
        assert_eq!(parse_payload(body).unwrap()[0].time, 1_704_153_600);
    }

    #[test]
    fn error_field_wins_over_rows() {
        let body = r#"{"rows":[{"t":"2024-01-02","o":1,"h":1,"l":1,"c":1,"v":1}],"error":"no data"}"#;
        let err = parse_payload(body).unwrap_err();
        assert!(matches!(err, ProviderError::Api { .. }));
        assert_eq!(err.to_string(), "API error: no data");
    }

    #[test]
    fn bad_timestamp_is_malformed() {
        let body = r#"{"rows":[{"t":"soon","o":1,"h":1,"l":1,"c":1,"v":1}]}"#;
        let err = parse_payload(body).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { .. }));
        assert!(err.to_string().contains("row 0"));
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            parse_payload("<html>"),
            Err(ProviderError::Malformed { .. })
        ));
    }

    #[test]
    fn missing_rows_is_empty() {
        assert!(parse_payload("{}").unwrap().is_empty());
    }
}
