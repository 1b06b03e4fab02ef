use crate::models::KLine;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Market scenario types for synthetic kline feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+2% daily average)
    Uptrend,
    /// Steady downtrend with noise (-2% daily average)
    Downtrend,
    /// Mean-reverting chop (±1% noise around the base price)
    Sideways,
    /// Large swings (±5% per bar)
    Volatile,
    /// Constant close
    Flat,
}

/// Generates reproducible kline series for demos and tests
pub struct SyntheticKlineGenerator {
    rng: StdRng,
    base_price: f64,
}

impl SyntheticKlineGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    /// Generate klines for a specific market scenario
    ///
    /// # Arguments
    /// * `scenario` - The market scenario to simulate
    /// * `num_klines` - Number of bars to generate
    /// * `interval_minutes` - Minutes between bars
    /// * `start_time` - Timestamp of the first bar
    ///
    /// Closes are rounded to 4 decimal places.
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        num_klines: usize,
        interval_minutes: i64,
        start_time: DateTime<Utc>,
    ) -> Vec<KLine> {
        let mut klines = Vec::with_capacity(num_klines);
        let mut price = self.base_price;

        // ±2% per day spread across the bars of one day
        let daily_drift = 0.02 / (24.0 * 60.0 / interval_minutes as f64);

        for i in 0..num_klines {
            let timestamp = start_time + Duration::minutes(i as i64 * interval_minutes);

            price += match scenario {
                MarketScenario::Uptrend => {
                    price * daily_drift + price * self.rng.gen_range(-0.001..0.001)
                }
                MarketScenario::Downtrend => {
                    -price * daily_drift + price * self.rng.gen_range(-0.001..0.001)
                }
                MarketScenario::Sideways => {
                    (self.base_price - price) * 0.1 + price * self.rng.gen_range(-0.01..0.01)
                }
                MarketScenario::Volatile => price * self.rng.gen_range(-0.05..0.05),
                MarketScenario::Flat => 0.0,
            };

            // Keep volatile walks from collapsing towards zero
            price = price.max(self.base_price * 0.5);

            klines.push(KLine::new(timestamp, to_close(price)));
        }

        klines
    }
}

fn to_close(price: f64) -> Decimal {
    Decimal::from_f64(price).unwrap_or_default().round_dp(4)
}
