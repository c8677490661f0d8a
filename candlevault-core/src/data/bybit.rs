//! Bybit public trade dumps.
//!
//! Bybit publishes one gzip-compressed CSV per symbol per day at
//! `{base}/{SYMBOL}/{SYMBOL}{YYYY-MM-DD}.csv.gz`. Rows carry at least
//! `timestamp` (fractional epoch seconds), `side`, `size` and `price`; other
//! columns (tick direction, match id, notional values) are ignored.
//!
//! A missing day answers HTTP 404, which maps to `FetchError::NotFound`.

use super::source::{FetchError, SourceAdapter};
use crate::config::BybitConfig;
use crate::domain::{Side, TradeRecord};
use chrono::NaiveDate;
use flate2::read::GzDecoder;
use reqwest::StatusCode;
use std::io::Read;
use std::time::Duration;

/// Default root of the public trade archive.
pub const BYBIT_BASE_URL: &str = "https://public.bybit.com/trading";

const EXCHANGE: &str = "bybit";

/// Bybit daily trade dump adapter.
pub struct BybitSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl BybitSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("candlevault/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Permanent(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &BybitConfig) -> Result<Self, FetchError> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Decode a gzip CSV dump into trades, stably sorted by timestamp.
    ///
    /// Any decompression, header or row error is permanent: retrying the same
    /// bytes cannot succeed.
    pub fn parse_dump<R: Read>(reader: R) -> Result<Vec<TradeRecord>, FetchError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(GzDecoder::new(reader));

        let headers = csv_reader
            .headers()
            .map_err(|e| FetchError::Permanent(format!("unreadable header: {e}")))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| FetchError::Permanent(format!("missing column '{name}'")))
        };
        let ts_col = column("timestamp")?;
        let side_col = column("side")?;
        let size_col = column("size")?;
        let price_col = column("price")?;

        let mut trades = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record =
                record.map_err(|e| FetchError::Permanent(format!("row {}: {e}", row + 1)))?;
            let field = |col: usize, name: &str| {
                record.get(col).ok_or_else(|| {
                    FetchError::Permanent(format!("row {}: missing {name}", row + 1))
                })
            };
            let number = |col: usize, name: &str| -> Result<f64, FetchError> {
                let raw = field(col, name)?;
                raw.parse::<f64>().map_err(|_| {
                    FetchError::Permanent(format!("row {}: invalid {name} '{raw}'", row + 1))
                })
            };

            let epoch_secs = number(ts_col, "timestamp")?;
            let side: Side = field(side_col, "side")?
                .parse()
                .map_err(|e| FetchError::Permanent(format!("row {}: {e}", row + 1)))?;
            let size = number(size_col, "size")?;
            let price = number(price_col, "price")?;

            let trade = TradeRecord::from_epoch_secs(epoch_secs, side, size, price).ok_or_else(
                || FetchError::Permanent(format!("row {}: timestamp out of range", row + 1)),
            )?;
            trades.push(trade);
        }

        // Dumps are not guaranteed ascending; a stable sort keeps source order on ties.
        trades.sort_by_key(|t| t.timestamp);
        Ok(trades)
    }
}

/// Map a non-success HTTP status to a fetch error; `None` means proceed.
fn classify(status: StatusCode, locator: &str) -> Option<FetchError> {
    if status == StatusCode::NOT_FOUND {
        return Some(FetchError::NotFound {
            locator: locator.to_string(),
        });
    }
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Some(FetchError::Transient(format!("HTTP {status} for {locator}")));
    }
    if !status.is_success() {
        return Some(FetchError::Permanent(format!("HTTP {status} for {locator}")));
    }
    None
}

impl SourceAdapter for BybitSource {
    fn exchange(&self) -> &str {
        EXCHANGE
    }

    fn daily_url(&self, symbol: &str, date: NaiveDate) -> String {
        format!(
            "{}/{symbol}/{symbol}{}.csv.gz",
            self.base_url,
            date.format("%Y-%m-%d")
        )
    }

    fn fetch(&self, locator: &str) -> Result<Vec<TradeRecord>, FetchError> {
        let resp = self
            .client
            .get(locator)
            .send()
            .map_err(|e| FetchError::Transient(format!("{locator}: {e}")))?;

        if let Some(err) = classify(resp.status(), locator) {
            return Err(err);
        }

        let body = resp
            .bytes()
            .map_err(|e| FetchError::Transient(format!("{locator}: body read failed: {e}")))?;
        Self::parse_dump(body.as_ref())
    }
}
