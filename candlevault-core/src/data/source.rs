//! Source adapter trait and structured fetch errors.
//!
//! A SourceAdapter knows how to locate and download one symbol-day of trades
//! from one exchange. The store and the pipelines sit above this trait;
//! adapters don't know about the store.

use crate::domain::TradeRecord;
use chrono::NaiveDate;
use thiserror::Error;

/// Why a symbol-day could not be fetched.
///
/// `NotFound` is not a failure: the exchange simply has no dump for that day
/// (before listing, or not yet published). The pipeline records it as skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("no data at {locator}")]
    NotFound { locator: String },

    #[error("transient fetch failure: {0}")]
    Transient(String),

    #[error("permanent fetch failure: {0}")]
    Permanent(String),
}

impl FetchError {
    /// True for the benign "day does not exist" outcome.
    pub fn is_no_data(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

/// Capability implemented once per exchange.
pub trait SourceAdapter: Send + Sync {
    /// Registry key, lowercase (e.g. `bybit`).
    fn exchange(&self) -> &str;

    /// Deterministic locator of the remote dump for one symbol-day.
    fn daily_url(&self, symbol: &str, date: NaiveDate) -> String;

    /// Download and decode a dump into trades, stably ordered by timestamp.
    fn fetch(&self, locator: &str) -> Result<Vec<TradeRecord>, FetchError>;
}
