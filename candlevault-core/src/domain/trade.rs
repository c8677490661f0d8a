//! TradeRecord: one executed trade as reported by an exchange dump.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Buy" | "buy" | "BUY" => Ok(Side::Buy),
            "Sell" | "sell" | "SELL" => Ok(Side::Sell),
            other => Err(format!("unknown trade side '{other}'")),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("Buy"),
            Side::Sell => f.write_str("Sell"),
        }
    }
}

/// A single trade. Immutable once produced by a source adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub size: f64,
    pub price: f64,
}

impl TradeRecord {
    pub fn new(timestamp: DateTime<Utc>, side: Side, size: f64, price: f64) -> Self {
        Self {
            timestamp,
            side,
            size,
            price,
        }
    }

    /// Build a trade from fractional epoch seconds (the exchange dump format).
    ///
    /// Returns `None` when the value is not representable as a UTC instant.
    pub fn from_epoch_secs(epoch_secs: f64, side: Side, size: f64, price: f64) -> Option<Self> {
        if !epoch_secs.is_finite() {
            return None;
        }
        // Round to microseconds: the dumps carry at most 4-6 fractional digits and
        // f64 noise must not push a trade across a second boundary.
        let micros = (epoch_secs * 1_000_000.0).round() as i64;
        let timestamp = DateTime::from_timestamp_micros(micros)?;
        Some(Self::new(timestamp, side, size, price))
    }

    /// Start of the 1-second bucket this trade falls into, as epoch seconds.
    pub fn second_bucket(&self) -> i64 {
        // `timestamp()` floors toward negative infinity; subsec part is never negative.
        self.timestamp.timestamp()
    }

    /// Price must be strictly positive, size non-negative, both finite.
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0 && self.size.is_finite() && self.size >= 0.0
    }
}
