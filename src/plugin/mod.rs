// Indicator plugin surface: what a host needs to declare, configure and run an indicator
pub mod runner;
pub mod stateful_rsi;

pub use runner::IndicatorRunner;
pub use stateful_rsi::StatefulRsiIndicator;

use crate::error::{EngineError, SettingsError};
use crate::models::KLine;
use crate::output::{Drawable, Rgba};
use crate::persistence::StateSlot;

/// Where the host draws the indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorType {
    /// On top of the price chart
    Overlay,
    /// In its own pane below the chart
    Pane,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Integer(i64),
    Color(Rgba),
}

/// A user-editable setting with its default
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: &'static str,
    pub default: ParameterValue,
}

impl Parameter {
    pub fn integer(name: &'static str, default: i64) -> Self {
        Self {
            name,
            default: ParameterValue::Integer(default),
        }
    }

    pub fn color(name: &'static str, default: Rgba) -> Self {
        Self {
            name,
            default: ParameterValue::Color(default),
        }
    }
}

/// Everything one `calculate` call sees
pub struct IndicatorContext<'a, S> {
    pub klines: &'a [KLine],
    pub settings: &'a S,
    /// Per-instance, per-series state; survives between calls
    pub state: &'a mut StateSlot,
    /// Set by the host when the slot held no state before this call
    pub is_reset: bool,
}

/// Base trait for all chart indicators
pub trait CustomIndicator: Send + Sync {
    type Settings;

    /// Get indicator name
    fn name(&self) -> &str;

    fn indicator_type(&self) -> IndicatorType;

    /// Parameters the host should expose, with defaults
    fn parameters(&self) -> Vec<Parameter>;

    /// Reject settings the indicator cannot run with
    fn validate_settings(&self, _settings: &Self::Settings) -> Result<(), SettingsError> {
        Ok(())
    }

    /// Called before the first `calculate` after the user edits settings
    fn on_settings_changed(&self, _new_settings: &Self::Settings, state: &mut StateSlot) {
        state.clear();
    }

    /// Compute drawables for the current series
    fn calculate(
        &self,
        context: IndicatorContext<'_, Self::Settings>,
    ) -> Result<Vec<Drawable>, EngineError>;
}
