use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single bar of the upstream price series
///
/// Only the close participates in RSI; timestamps are strictly increasing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct KLine {
    pub timestamp: DateTime<Utc>,
    pub close: Decimal,
}

impl KLine {
    pub fn new(timestamp: DateTime<Utc>, close: Decimal) -> Self {
        Self { timestamp, close }
    }
}

/// One computed RSI value, always within [0, 100]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RsiPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
}

/// Smoothing state carried between engine invocations
///
/// Only meaningful for the period it was seeded with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineState {
    pub avg_gain: Decimal,
    pub avg_loss: Decimal,
    pub last_timestamp: DateTime<Utc>,
    pub period: usize,
}

impl EngineState {
    /// Whether this state can be resumed with `period`
    pub fn is_valid_for(&self, period: usize) -> bool {
        self.period == period
            && self.avg_gain >= Decimal::ZERO
            && self.avg_loss >= Decimal::ZERO
    }
}

/// Identifies one price series on the host (e.g. SOL on the 5m chart)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: String,
    pub timeframe: String,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.timeframe)
    }
}

/// State slot address: one indicator instance on one series
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub instance: Uuid,
    pub series: SeriesKey,
}

impl StateKey {
    pub fn new(instance: Uuid, series: SeriesKey) -> Self {
        Self { instance, series }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_state(period: usize) -> EngineState {
        EngineState {
            avg_gain: dec!(0.25),
            avg_loss: dec!(0.1),
            last_timestamp: Utc::now(),
            period,
        }
    }

    #[test]
    fn test_state_valid_for_seeded_period_only() {
        let state = test_state(14);

        assert!(state.is_valid_for(14));
        assert!(!state.is_valid_for(9));
    }

    #[test]
    fn test_state_with_negative_average_is_invalid() {
        let mut state = test_state(14);
        state.avg_loss = dec!(-0.1);

        assert!(!state.is_valid_for(14));
    }

    #[test]
    fn test_series_key_display() {
        let key = SeriesKey::new("SOL", "5m");
        assert_eq!(key.to_string(), "SOL@5m");
    }

    #[test]
    fn test_state_json_shape() {
        let state = test_state(14);
        let json = serde_json::to_value(state).unwrap();

        assert_eq!(json["avg_gain"], "0.25");
        assert_eq!(json["period"], 14);

        let back: EngineState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
