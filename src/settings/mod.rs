//! Settings resolver for the RSI indicator.
//!
//! Layers, lowest priority first: built-in defaults, an optional TOML file,
//! then `RSI_*` environment variables (`RSI_PERIOD`, `RSI_OVERBOUGHT`,
//! `RSI_OVERSOLD`, `RSI_RSI_COLOR`, `RSI_BAND_COLOR`).

use crate::error::SettingsError;
use crate::output::{BandStyle, Rgba};
use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_PERIOD: i64 = 14;
pub const DEFAULT_OVERBOUGHT: i64 = 70;
pub const DEFAULT_OVERSOLD: i64 = 30;
pub const DEFAULT_RSI_COLOR: &str = "#9C27B0";
pub const DEFAULT_BAND_COLOR: &str = "#80808032";

/// Validated indicator settings
#[derive(Debug, Clone, PartialEq)]
pub struct RsiSettings {
    pub period: usize,
    pub overbought: Decimal,
    pub oversold: Decimal,
    pub rsi_color: Rgba,
    pub band_color: Rgba,
}

/// Settings as they come out of the config layers, before validation
#[derive(Debug, Clone, Deserialize)]
struct RawSettings {
    period: i64,
    overbought: Decimal,
    oversold: Decimal,
    rsi_color: String,
    band_color: String,
}

impl Default for RsiSettings {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD as usize,
            overbought: Decimal::from(DEFAULT_OVERBOUGHT),
            oversold: Decimal::from(DEFAULT_OVERSOLD),
            rsi_color: Rgba::rgb(156, 39, 176),
            band_color: Rgba::rgba(128, 128, 128, 50),
        }
    }
}

impl RsiSettings {
    /// Resolve settings from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = defaults()?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(Environment::with_prefix("RSI").try_parsing(true))
            .build()?;

        Self::from_config(config)
    }

    /// Validate an already assembled [`Config`]
    ///
    /// Missing keys fall back to the defaults.
    pub fn from_config(config: Config) -> Result<Self, SettingsError> {
        let merged = defaults()?.add_source(config).build()?;
        let raw: RawSettings = merged.try_deserialize()?;
        if raw.period < 1 {
            return Err(SettingsError::InvalidPeriod(raw.period));
        }

        let settings = Self {
            period: raw.period as usize,
            overbought: raw.overbought,
            oversold: raw.oversold,
            rsi_color: parse_color(&raw.rsi_color)?,
            band_color: parse_color(&raw.band_color)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check period and level invariants
    ///
    /// Applies to settings built in code as well as resolved ones.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.period == 0 {
            return Err(SettingsError::InvalidPeriod(0));
        }

        let hundred = Decimal::ONE_HUNDRED;
        for (name, value) in [("overbought", self.overbought), ("oversold", self.oversold)] {
            if value < Decimal::ZERO || value > hundred {
                return Err(SettingsError::LevelOutOfRange {
                    name,
                    value: value.to_string(),
                });
            }
        }
        if self.oversold >= self.overbought {
            return Err(SettingsError::InvertedLevels {
                oversold: self.oversold.to_string(),
                overbought: self.overbought.to_string(),
            });
        }
        Ok(())
    }

    pub fn band_style(&self) -> BandStyle {
        BandStyle {
            overbought: self.overbought,
            oversold: self.oversold,
            line_color: self.rsi_color,
            band_color: self.band_color,
        }
    }
}

fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, SettingsError> {
    Ok(Config::builder()
        .set_default("period", DEFAULT_PERIOD)?
        .set_default("overbought", DEFAULT_OVERBOUGHT)?
        .set_default("oversold", DEFAULT_OVERSOLD)?
        .set_default("rsi_color", DEFAULT_RSI_COLOR)?
        .set_default("band_color", DEFAULT_BAND_COLOR)?)
}

fn parse_color(raw: &str) -> Result<Rgba, SettingsError> {
    raw.parse()
        .map_err(|_| SettingsError::InvalidColor(raw.to_string()))
}
