//! Error types for the engine, the state store and settings resolution.

use thiserror::Error;

/// Errors raised by the incremental RSI engine.
///
/// Insufficient data and corrupt stored state are deliberately absent:
/// both are normal conditions handled without failing the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Period must be at least 1
    #[error("invalid RSI period {0}: must be >= 1")]
    InvalidPeriod(usize),
}

/// Errors raised by the in-memory state store and kline buffer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another thread panicked while holding the lock
    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// State could not be encoded into a slot
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        StoreError::Poisoned(err.to_string())
    }
}

/// Errors raised while loading or validating indicator settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("period must be >= 1, got {0}")]
    InvalidPeriod(i64),

    #[error("{name} level {value} outside [0, 100]")]
    LevelOutOfRange { name: &'static str, value: String },

    #[error("oversold level {oversold} must be below overbought level {overbought}")]
    InvertedLevels { oversold: String, overbought: String },

    #[error("invalid color {0:?}: expected #RRGGBB or #RRGGBBAA")]
    InvalidColor(String),

    #[error("configuration error: {0}")]
    Source(#[from] config::ConfigError),
}
