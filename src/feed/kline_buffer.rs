use crate::error::StoreError;
use crate::models::{KLine, SeriesKey};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory buffer for kline data
///
/// Maintains a rolling window of bars for each series. Trimming the oldest
/// bars is what the RSI engine's timestamp-based resumption copes with.
#[derive(Clone)]
pub struct KlineBuffer {
    data: Arc<RwLock<HashMap<SeriesKey, VecDeque<KLine>>>>,
    max_klines: usize,
}

impl KlineBuffer {
    /// Create a new kline buffer
    ///
    /// # Arguments
    /// * `max_klines` - Maximum number of bars to keep per series
    pub fn new(max_klines: usize) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            max_klines,
        }
    }

    /// Append a bar to a series
    ///
    /// Returns `Ok(false)` without storing anything when the bar is not
    /// strictly newer than the last one. If the buffer is full, the oldest
    /// bar is removed.
    pub fn push(&self, key: &SeriesKey, kline: KLine) -> Result<bool, StoreError> {
        let mut data = self.data.write()?;
        let series = data.entry(key.clone()).or_default();

        if let Some(last) = series.back() {
            if kline.timestamp <= last.timestamp {
                tracing::debug!(
                    "Dropping out-of-order bar {} for {} (last {})",
                    kline.timestamp,
                    key,
                    last.timestamp
                );
                return Ok(false);
            }
        }

        series.push_back(kline);
        while series.len() > self.max_klines {
            series.pop_front();
        }

        Ok(true)
    }

    /// Append several bars, returning how many were accepted
    pub fn extend(&self, key: &SeriesKey, klines: &[KLine]) -> Result<usize, StoreError> {
        let mut accepted = 0;
        for kline in klines {
            if self.push(key, *kline)? {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    /// Get all bars for a series, oldest first
    pub fn klines(&self, key: &SeriesKey) -> Result<Vec<KLine>, StoreError> {
        let data = self.data.read()?;

        Ok(data
            .get(key)
            .map(|deque| deque.iter().copied().collect())
            .unwrap_or_default())
    }

    /// Get count of bars for a series
    pub fn len(&self, key: &SeriesKey) -> Result<usize, StoreError> {
        let data = self.data.read()?;
        Ok(data.get(key).map(|d| d.len()).unwrap_or(0))
    }

    /// Get all tracked series
    pub fn series(&self) -> Result<Vec<SeriesKey>, StoreError> {
        let data = self.data.read()?;
        Ok(data.keys().cloned().collect())
    }

    /// Clear all data for a series
    pub fn clear_series(&self, key: &SeriesKey) -> Result<(), StoreError> {
        let mut data = self.data.write()?;
        data.remove(key);
        Ok(())
    }
}
