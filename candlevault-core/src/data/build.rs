//! Build pipeline: stored 1-second days → one N-second series.
//!
//! Present days are read in ascending order, concatenated, and resampled once
//! over the whole concatenation so windows that straddle midnight come out
//! whole. Absent days are skipped; a range whose stored days hold no candle
//! at all is `NoData`.

use super::store::{self, DailyStore, StoreError, CANDLE_FILE_EXT};
use crate::candles::resample;
use crate::domain::date_range::DAY_FORMAT;
use crate::domain::{Candle, CandleError, DateRange};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid build request: {0}")]
    InvalidInput(String),

    #[error("no data stored for {exchange}/{symbol} in {range}")]
    NoData {
        exchange: String,
        symbol: String,
        range: DateRange,
    },

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("stored candles are inconsistent: {0}")]
    Corruption(String),

    #[error("output directory {0} does not exist")]
    MissingOutputDir(PathBuf),
}

impl BuildError {
    pub fn is_no_data(&self) -> bool {
        matches!(self, BuildError::NoData { .. })
    }
}

impl From<CandleError> for BuildError {
    fn from(e: CandleError) -> Self {
        match e {
            CandleError::InvalidInput(msg) => BuildError::InvalidInput(msg),
            CandleError::DataCorruption(msg) => BuildError::Corruption(msg),
        }
    }
}

/// A derived N-second series over a date range.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltSeries {
    pub exchange: String,
    pub symbol: String,
    pub range: DateRange,
    pub interval_secs: u32,
    pub candles: Vec<Candle>,
    /// Days of the range that had a stored file, ascending.
    pub days_found: Vec<NaiveDate>,
    /// Days of the range without one, ascending.
    pub days_missing: Vec<NaiveDate>,
}

impl BuiltSeries {
    /// `{exchange}_{symbol}_{YYYYMMDD}_{YYYYMMDD}_{interval}s.csv.gz`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}s{CANDLE_FILE_EXT}",
            self.exchange,
            self.symbol,
            self.range.begin().format(DAY_FORMAT),
            self.range.end().format(DAY_FORMAT),
            self.interval_secs
        )
    }
}

pub fn build(
    store: &DailyStore,
    exchange: &str,
    symbol: &str,
    range: &DateRange,
    interval_secs: u32,
) -> Result<BuiltSeries, BuildError> {
    if interval_secs == 0 {
        return Err(BuildError::InvalidInput(
            "interval must be at least 1 second".into(),
        ));
    }

    let mut concatenated: Vec<Candle> = Vec::new();
    let mut days_found = Vec::new();
    let mut days_missing = Vec::new();

    for date in range.days() {
        match store.read(exchange, symbol, date)? {
            Some(day) => {
                tracing::debug!(%date, candles = day.len(), "read stored day");
                concatenated.extend(day);
                days_found.push(date);
            }
            None => days_missing.push(date),
        }
    }

    if concatenated.is_empty() {
        if !days_found.is_empty() {
            tracing::warn!(
                exchange,
                symbol,
                range = %range,
                days_found = days_found.len(),
                "stored days hold no candles"
            );
        }
        return Err(BuildError::NoData {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            range: *range,
        });
    }

    let candles = resample(&concatenated, interval_secs)?;
    tracing::info!(
        exchange,
        symbol,
        range = %range,
        interval_secs,
        days_found = days_found.len(),
        days_missing = days_missing.len(),
        candles = candles.len(),
        "series built"
    );

    Ok(BuiltSeries {
        exchange: exchange.to_string(),
        symbol: symbol.to_string(),
        range: *range,
        interval_secs,
        candles,
        days_found,
        days_missing,
    })
}

/// Write a series into `out_dir` under its canonical file name.
pub fn write_series(series: &BuiltSeries, out_dir: &Path) -> Result<PathBuf, BuildError> {
    if !out_dir.is_dir() {
        return Err(BuildError::MissingOutputDir(out_dir.to_path_buf()));
    }
    let path = out_dir.join(series.file_name());
    store::write_candles(&path, &series.candles)?;
    Ok(path)
}
