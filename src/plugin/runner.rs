use super::{CustomIndicator, IndicatorContext};
use crate::models::{KLine, SeriesKey, StateKey};
use crate::output::Drawable;
use crate::persistence::StateStore;
use uuid::Uuid;

/// Host-side driver for one loaded indicator instance
///
/// Derives the reset flag from the state store: an empty slot means the
/// indicator must start over (first run, settings change, or host clear).
pub struct IndicatorRunner<I: CustomIndicator> {
    indicator: I,
    instance: Uuid,
    settings: I::Settings,
    store: StateStore,
}

impl<I> IndicatorRunner<I>
where
    I: CustomIndicator,
    I::Settings: Clone + PartialEq,
{
    /// Load an indicator with its own fresh instance id
    pub fn new(indicator: I, settings: I::Settings, store: StateStore) -> Self {
        let instance = Uuid::new_v4();
        tracing::info!("Loaded indicator '{}' as {}", indicator.name(), instance);

        Self {
            indicator,
            instance,
            settings,
            store,
        }
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn settings(&self) -> &I::Settings {
        &self.settings
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    /// Run the indicator over the current bars of one series
    pub fn run(&self, series: &SeriesKey, klines: &[KLine]) -> crate::Result<Vec<Drawable>> {
        let key = StateKey::new(self.instance, series.clone());
        let mut slot = self.store.slot(&key)?;
        let is_reset = slot.is_empty();

        let drawables = self.indicator.calculate(IndicatorContext {
            klines,
            settings: &self.settings,
            state: &mut slot,
            is_reset,
        })?;

        self.store.commit(&key, slot)?;

        tracing::debug!(
            "{} on {}: {} bars, reset={}, {} drawables",
            self.indicator.name(),
            series,
            klines.len(),
            is_reset,
            drawables.len()
        );

        Ok(drawables)
    }

    /// Apply new settings, letting the indicator invalidate its state
    ///
    /// Returns `false` when nothing changed. Invalid settings are rejected
    /// before any state is touched.
    pub fn update_settings(&mut self, settings: I::Settings) -> crate::Result<bool> {
        if settings == self.settings {
            return Ok(false);
        }
        if let Err(e) = self.indicator.validate_settings(&settings) {
            tracing::warn!("Rejected settings for {}: {}", self.instance, e);
            return Err(e.into());
        }

        for key in self.store.keys_for_instance(self.instance)? {
            let mut slot = self.store.slot(&key)?;
            self.indicator.on_settings_changed(&settings, &mut slot);
            self.store.commit(&key, slot)?;
        }

        tracing::info!("Settings changed for {}", self.instance);
        self.settings = settings;
        Ok(true)
    }

    /// Drop every state slot of this instance
    pub fn unload(self) -> crate::Result<usize> {
        let removed = self.store.clear_instance(self.instance)?;
        tracing::info!(
            "Unloaded indicator '{}' ({}), dropped {} state slots",
            self.indicator.name(),
            self.instance,
            removed
        );
        Ok(removed)
    }
}
