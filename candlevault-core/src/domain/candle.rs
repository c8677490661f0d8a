//! Candle: OHLCV summary of one time bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance used when checking `volume == buy_volume + sell_volume`.
pub const VOLUME_EPSILON: f64 = 1e-9;

/// OHLCV candle for one bucket, with the volume split by aggressor side.
///
/// Stored candles are 1-second buckets; built series use N-second buckets.
/// `bucket_start` is always aligned to the bucket width (epoch-aligned).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub bucket_start: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
}

impl Candle {
    /// Bucket start as epoch seconds.
    pub fn bucket_secs(&self) -> i64 {
        self.bucket_start.timestamp()
    }

    /// OHLC ordering and volume split hold.
    pub fn is_consistent(&self) -> bool {
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        let scale = self.volume.abs().max(1.0);
        self.low <= body_low
            && body_high <= self.high
            && self.buy_volume >= 0.0
            && self.sell_volume >= 0.0
            && (self.volume - (self.buy_volume + self.sell_volume)).abs() <= VOLUME_EPSILON * scale
    }
}

/// Errors raised by the pure candle transforms (aggregate, resample).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("data corruption: {0}")]
    DataCorruption(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_candle() -> Candle {
        Candle {
            bucket_start: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
            open: 100.0,
            high: 101.0,
            low: 99.5,
            close: 100.5,
            volume: 3.0,
            buy_volume: 1.0,
            sell_volume: 2.0,
        }
    }

    #[test]
    fn candle_is_consistent() {
        assert!(sample_candle().is_consistent());
    }

    #[test]
    fn candle_detects_inverted_range() {
        let mut c = sample_candle();
        c.high = 99.0;
        assert!(!c.is_consistent());
    }

    #[test]
    fn candle_detects_volume_split_mismatch() {
        let mut c = sample_candle();
        c.sell_volume = 5.0;
        assert!(!c.is_consistent());
    }

    #[test]
    fn candle_serializes_with_camel_case_volumes() {
        let json = serde_json::to_string(&sample_candle()).unwrap();
        assert!(json.contains("\"buyVolume\":1.0"));
        assert!(json.contains("\"bucketStart\""));
    }
}
