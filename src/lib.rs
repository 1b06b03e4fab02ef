// Core modules
pub mod error;
pub mod feed;
pub mod indicators;
pub mod models;
pub mod output;
pub mod persistence;
pub mod plugin;
pub mod settings;

// Re-export commonly used types
pub use error::{EngineError, SettingsError, StoreError};
pub use indicators::rsi::{compute, RsiComputation, RsiOutcome};
pub use models::*;
pub use plugin::{CustomIndicator, IndicatorRunner, StatefulRsiIndicator};
pub use settings::RsiSettings;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
