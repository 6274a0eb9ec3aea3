//! TOML profile configuration.
//!
//! A [`ProfileConfig`] describes one indicator instance: which variant, how
//! rows are laid out, period and anchor choices, and an opaque `[style]` table
//! that is handed to the renderer untouched. Enum-valued strings are lenient
//! (unknown period, rows layout or anchor mode fall back to the default);
//! structural mistakes such as misspelled keys, a bad time zone or a bad
//! timeframe are errors.
//!
//! Entrypoints: [`load_config_str`] and [`load_config_path`].

use std::path::Path;

use chrono_tz::Tz;
use market_data::{AssetClass, Timeframe, TimeframeError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    anchor::AnchorMode,
    ltf::LtfSelection,
    period::{PeriodClock, PeriodType},
    profile::{MAX_ROWS, ProfileSettings},
    variants::{
        DEFAULT_ANCHOR_LENGTH, DEFAULT_HD_PERIODS, DEFAULT_HD_ROWS, DEFAULT_MAX_TOTAL_ROWS,
        DEFAULT_ROWS_PER_PERIOD, VariantKind, VariantParams,
    },
    window::TrackerOptions,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown session time zone: {0}")]
    Timezone(String),
    #[error("invalid timeframe: {0}")]
    Timeframe(#[from] TimeframeError),
    #[error("{field} must be positive")]
    NotPositive { field: &'static str },
    #[error("num_rows {0} exceeds the limit of {max}", max = MAX_ROWS)]
    TooManyRows(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileConfig {
    pub variant: VariantKind,
    /// Chart resolution, e.g. `"1D"` or `"15m"`.
    pub display_timeframe: Timeframe,
    pub asset_class: AssetClass,
    /// IANA zone for session boundaries.
    pub session_timezone: String,
    pub profile: ProfileSettings,
    /// Used by the periodic variant.
    pub period: PeriodType,
    pub max_total_rows: usize,
    pub rows_per_period: usize,
    pub hd_periods: usize,
    pub hd_rows: usize,
    pub anchor_mode: AnchorMode,
    pub anchor_length: usize,
    /// `"auto"` or a fixed resolution such as `"5m"`.
    pub ltf: String,
    pub intrabar: bool,
    /// Overrides the variant's default debounce.
    pub debounce_ms: Option<u64>,
    pub tracking: bool,
    pub style: toml::Table,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            variant: VariantKind::default(),
            display_timeframe: Timeframe::ONE_DAY,
            asset_class: AssetClass::default(),
            session_timezone: "UTC".to_string(),
            profile: ProfileSettings::default(),
            period: PeriodType::default(),
            max_total_rows: DEFAULT_MAX_TOTAL_ROWS,
            rows_per_period: DEFAULT_ROWS_PER_PERIOD,
            hd_periods: DEFAULT_HD_PERIODS,
            hd_rows: DEFAULT_HD_ROWS,
            anchor_mode: AnchorMode::default(),
            anchor_length: DEFAULT_ANCHOR_LENGTH,
            ltf: "auto".to_string(),
            intrabar: false,
            debounce_ms: None,
            tracking: true,
            style: toml::Table::new(),
        }
    }
}

impl ProfileConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("profile.num_rows", self.profile.num_rows),
            ("max_total_rows", self.max_total_rows),
            ("rows_per_period", self.rows_per_period),
            ("hd_rows", self.hd_rows),
            ("anchor_length", self.anchor_length),
        ];
        if let Some(&(field, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::NotPositive { field });
        }
        if self.profile.num_rows > MAX_ROWS {
            return Err(ConfigError::TooManyRows(self.profile.num_rows));
        }
        self.session_tz()?;
        self.ltf_selection()?;
        Ok(())
    }

    pub fn session_tz(&self) -> Result<Tz, ConfigError> {
        self.session_timezone
            .trim()
            .parse()
            .map_err(|_| ConfigError::Timezone(self.session_timezone.clone()))
    }

    pub fn ltf_selection(&self) -> Result<LtfSelection, ConfigError> {
        let raw = self.ltf.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
            return Ok(LtfSelection::Auto);
        }
        Ok(LtfSelection::Forced(raw.parse()?))
    }

    pub fn variant_params(&self) -> Result<VariantParams, ConfigError> {
        Ok(VariantParams {
            kind: self.variant,
            settings: self.profile,
            display: self.display_timeframe,
            period: self.period,
            max_total_rows: self.max_total_rows,
            rows_per_period: self.rows_per_period,
            hd_periods: self.hd_periods,
            hd_rows: self.hd_rows,
            anchor_mode: self.anchor_mode,
            anchor_length: self.anchor_length,
            clock: PeriodClock::new(self.session_tz()?),
        })
    }

    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions {
            debounce_ms: self
                .debounce_ms
                .unwrap_or_else(|| self.variant.default_debounce_ms()),
            enabled: self.tracking,
        }
    }
}

/// Parses and validates a TOML document.
pub fn load_config_str(s: &str) -> Result<ProfileConfig, ConfigError> {
    let config: ProfileConfig = toml::from_str(s)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config_path(path: impl AsRef<Path>) -> Result<ProfileConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_config_str(&raw)
}
