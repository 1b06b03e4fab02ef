// Kline feed: rolling per-series buffers, JSON loading, synthetic series

pub mod kline_buffer;
pub mod synthetic;

pub use kline_buffer::KlineBuffer;
pub use synthetic::{MarketScenario, SyntheticKlineGenerator};

use crate::models::KLine;
use anyhow::{Context, Result};
use std::path::Path;

/// Load a kline series from a JSON array of `{"timestamp", "close"}` objects
///
/// The series must be strictly increasing in time.
pub fn load_klines_json(path: &Path) -> Result<Vec<KLine>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read kline file {}", path.display()))?;
    parse_klines_json(&raw).with_context(|| format!("Invalid kline file {}", path.display()))
}

pub fn parse_klines_json(raw: &str) -> Result<Vec<KLine>> {
    let klines: Vec<KLine> = serde_json::from_str(raw)?;

    if let Some(pair) = klines.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
        anyhow::bail!(
            "Klines are not strictly increasing: {} followed by {}",
            pair[0].timestamp,
            pair[1].timestamp
        );
    }

    Ok(klines)
}
