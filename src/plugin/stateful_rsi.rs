use super::{CustomIndicator, IndicatorContext, IndicatorType, Parameter};
use crate::error::{EngineError, SettingsError};
use crate::indicators::rsi::{self, RsiOutcome};
use crate::models::EngineState;
use crate::output::{self, Drawable};
use crate::settings::{
    RsiSettings, DEFAULT_OVERBOUGHT, DEFAULT_OVERSOLD, DEFAULT_PERIOD,
};

/// RSI drawn in its own pane, computed incrementally across calls
///
/// Smoothing state lives in the host-provided slot, never in the indicator,
/// so one instance can serve any number of charts.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatefulRsiIndicator;

impl StatefulRsiIndicator {
    pub fn new() -> Self {
        Self
    }
}

impl CustomIndicator for StatefulRsiIndicator {
    type Settings = RsiSettings;

    fn name(&self) -> &str {
        "Stateful RSI"
    }

    fn indicator_type(&self) -> IndicatorType {
        IndicatorType::Pane
    }

    fn parameters(&self) -> Vec<Parameter> {
        let defaults = RsiSettings::default();
        vec![
            Parameter::integer("Period", DEFAULT_PERIOD),
            Parameter::integer("Overbought", DEFAULT_OVERBOUGHT),
            Parameter::integer("Oversold", DEFAULT_OVERSOLD),
            Parameter::color("RSI Color", defaults.rsi_color),
            Parameter::color("Band Color", defaults.band_color),
        ]
    }

    fn validate_settings(&self, settings: &RsiSettings) -> Result<(), SettingsError> {
        settings.validate()
    }

    fn calculate(
        &self,
        context: IndicatorContext<'_, RsiSettings>,
    ) -> Result<Vec<Drawable>, EngineError> {
        let IndicatorContext {
            klines,
            settings,
            state,
            is_reset,
        } = context;

        let prior: Option<EngineState> = if is_reset { None } else { state.load() };
        let result = rsi::compute(klines, settings.period, is_reset, prior.as_ref())?;

        if result.outcome == RsiOutcome::InsufficientData {
            return Ok(Vec::new());
        }

        if result.state != prior {
            if let Some(new_state) = &result.state {
                if let Err(e) = state.store(new_state) {
                    // Next call reseeds from scratch
                    tracing::error!("Failed to persist RSI state: {}", e);
                    state.clear();
                }
            }
        }

        Ok(output::emit(&result.points, klines, &settings.band_style()))
    }
}
