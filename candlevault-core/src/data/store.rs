//! Daily candle store.
//!
//! Layout: `{root}/{exchange}/{symbol}/{YYYYMMDD}.csv.gz`
//!
//! Each file holds one day of 1-second candles as gzip-compressed CSV with the
//! columns `datetime,open,high,low,close,volume,buyVolume,sellVolume`,
//! ascending by `datetime`. Files are written once and never modified in
//! place.
//!
//! Writes go to a per-process temp file and are renamed into place, so readers
//! never observe a half-written day. There is no lock: two processes ingesting
//! the same key at the same time both write, and the last rename wins.

use crate::config::Config;
use crate::domain::date_range::DAY_FORMAT;
use crate::domain::{Candle, DateRange};
use chrono::{NaiveDate, NaiveDateTime};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension shared by day files and build artifacts.
pub const CANDLE_FILE_EXT: &str = ".csv.gz";

/// Header of every candle file, in order.
pub const COLUMNS: [&str; 8] = [
    "datetime",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "buyVolume",
    "sellVolume",
];

/// Timestamp format of the `datetime` column (UTC).
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("corrupt candle file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("invalid store key component '{0}'")]
    InvalidKey(String),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// On-disk row shape.
#[derive(Debug, Serialize, Deserialize)]
struct CandleRow {
    datetime: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(rename = "buyVolume")]
    buy_volume: f64,
    #[serde(rename = "sellVolume")]
    sell_volume: f64,
}

impl From<&Candle> for CandleRow {
    fn from(c: &Candle) -> Self {
        Self {
            datetime: c.bucket_start.format(DATETIME_FORMAT).to_string(),
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
            buy_volume: c.buy_volume,
            sell_volume: c.sell_volume,
        }
    }
}

impl CandleRow {
    fn into_candle(self) -> Result<Candle, String> {
        let bucket_start = NaiveDateTime::parse_from_str(&self.datetime, DATETIME_FORMAT)
            .map_err(|e| format!("bad datetime '{}': {e}", self.datetime))?
            .and_utc();
        Ok(Candle {
            bucket_start,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            buy_volume: self.buy_volume,
            sell_volume: self.sell_volume,
        })
    }
}

/// Stored coverage for one (exchange, symbol).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub exchange: String,
    pub symbol: String,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub days: usize,
    pub bytes: u64,
}

/// Everything in the store, sorted by (exchange, symbol).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    pub entries: Vec<InventoryEntry>,
    /// Size of every file under the store root, day files or not.
    pub total_bytes: u64,
}

/// The daily candle store.
#[derive(Debug, Clone)]
pub struct DailyStore {
    root: PathBuf,
}

impl DailyStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.storage_dir.clone())
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for one (exchange, symbol): `{root}/{exchange}/{symbol}/`
    fn symbol_dir(&self, exchange: &str, symbol: &str) -> Result<PathBuf, StoreError> {
        Ok(self
            .root
            .join(check_key_component(exchange)?)
            .join(check_key_component(symbol)?))
    }

    /// Path of one day file: `{root}/{exchange}/{symbol}/{YYYYMMDD}.csv.gz`
    pub fn day_path(
        &self,
        exchange: &str,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<PathBuf, StoreError> {
        Ok(self
            .symbol_dir(exchange, symbol)?
            .join(format!("{}{CANDLE_FILE_EXT}", date.format(DAY_FORMAT))))
    }

    /// Whether a day file is present.
    pub fn exists(&self, exchange: &str, symbol: &str, date: NaiveDate) -> Result<bool, StoreError> {
        Ok(self.day_path(exchange, symbol, date)?.is_file())
    }

    /// Read one day. `Ok(None)` when the day is not stored.
    pub fn read(
        &self,
        exchange: &str,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<Vec<Candle>>, StoreError> {
        let path = self.day_path(exchange, symbol, date)?;
        if !path.is_file() {
            return Ok(None);
        }
        read_candles(&path).map(Some)
    }

    /// Write one day, atomically replacing whatever is at the key.
    pub fn write(
        &self,
        exchange: &str,
        symbol: &str,
        date: NaiveDate,
        candles: &[Candle],
    ) -> Result<PathBuf, StoreError> {
        let path = self.day_path(exchange, symbol, date)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        write_candles(&path, candles)?;
        Ok(path)
    }

    /// Days of `range` that are present, ascending.
    pub fn stored_dates(
        &self,
        exchange: &str,
        symbol: &str,
        range: &DateRange,
    ) -> Result<Vec<NaiveDate>, StoreError> {
        let mut present = Vec::new();
        for date in range.days() {
            if self.exists(exchange, symbol, date)? {
                present.push(date);
            }
        }
        Ok(present)
    }

    /// Delete every stored day of `range`. Returns the days removed, ascending.
    pub fn remove_range(
        &self,
        exchange: &str,
        symbol: &str,
        range: &DateRange,
    ) -> Result<Vec<NaiveDate>, StoreError> {
        let mut removed = Vec::new();
        for date in range.days() {
            let path = self.day_path(exchange, symbol, date)?;
            match fs::remove_file(&path) {
                Ok(()) => removed.push(date),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
        if !removed.is_empty() {
            tracing::info!(
                exchange,
                symbol,
                range = %range,
                removed = removed.len(),
                "removed stored days"
            );
        }
        Ok(removed)
    }

    /// Walk the store and summarise coverage per (exchange, symbol).
    ///
    /// Entries that do not follow the layout are counted in `total_bytes` but
    /// otherwise ignored. A missing root is an empty inventory.
    pub fn inventory(&self) -> Result<Inventory, StoreError> {
        let mut inventory = Inventory::default();
        if !self.root.is_dir() {
            return Ok(inventory);
        }

        let mut coverage: BTreeMap<(String, String), InventoryEntry> = BTreeMap::new();

        for exchange_dir in read_dir_sorted(&self.root)? {
            if !exchange_dir.is_dir() {
                inventory.total_bytes += file_len(&exchange_dir)?;
                continue;
            }
            let exchange = file_name(&exchange_dir);
            for symbol_dir in read_dir_sorted(&exchange_dir)? {
                if !symbol_dir.is_dir() {
                    inventory.total_bytes += file_len(&symbol_dir)?;
                    continue;
                }
                let symbol = file_name(&symbol_dir);
                for day_file in read_dir_sorted(&symbol_dir)? {
                    if !day_file.is_file() {
                        continue;
                    }
                    let bytes = file_len(&day_file)?;
                    inventory.total_bytes += bytes;

                    let Some(date) = parse_day_file_name(&file_name(&day_file)) else {
                        continue;
                    };
                    coverage
                        .entry((exchange.clone(), symbol.clone()))
                        .and_modify(|entry| {
                            entry.first_day = entry.first_day.min(date);
                            entry.last_day = entry.last_day.max(date);
                            entry.days += 1;
                            entry.bytes += bytes;
                        })
                        .or_insert_with(|| InventoryEntry {
                            exchange: exchange.clone(),
                            symbol: symbol.clone(),
                            first_day: date,
                            last_day: date,
                            days: 1,
                            bytes,
                        });
                }
            }
        }

        inventory.entries = coverage.into_values().collect();
        Ok(inventory)
    }
}

/// Write candles as gzip CSV at `path`, via a temp file and rename.
pub fn write_candles(path: &Path, candles: &[Candle]) -> Result<(), StoreError> {
    let tmp_path = temp_path(path);
    let result = encode_to(&tmp_path, candles).and_then(|()| {
        fs::rename(&tmp_path, path).map_err(|e| StoreError::io(path, e))
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Read a gzip CSV candle file, checking rows are strictly ascending.
pub fn read_candles(path: &Path) -> Result<Vec<Candle>, StoreError> {
    let file = fs::File::open(path).map_err(|e| StoreError::io(path, e))?;
    let mut reader = csv::Reader::from_reader(GzDecoder::new(file));
    let corrupt = |reason: String| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    // A failed header read is otherwise swallowed by `deserialize`.
    let headers = reader
        .headers()
        .map_err(|e| corrupt(format!("header: {e}")))?;
    if !headers.iter().eq(COLUMNS) {
        return Err(corrupt(format!(
            "unexpected header '{}'",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    let mut candles: Vec<Candle> = Vec::new();
    for (row, record) in reader.deserialize::<CandleRow>().enumerate() {
        let candle = record
            .map_err(|e| corrupt(format!("row {}: {e}", row + 1)))?
            .into_candle()
            .map_err(|e| corrupt(format!("row {}: {e}", row + 1)))?;
        if let Some(prev) = candles.last() {
            if candle.bucket_start <= prev.bucket_start {
                return Err(corrupt(format!(
                    "row {}: {} is not after {}",
                    row + 1,
                    candle.bucket_start,
                    prev.bucket_start
                )));
            }
        }
        candles.push(candle);
    }
    Ok(candles)
}

fn encode_to(path: &Path, candles: &[Candle]) -> Result<(), StoreError> {
    let to_io = |e: csv::Error| StoreError::io(path, io::Error::other(e));

    let file = fs::File::create(path).map_err(|e| StoreError::io(path, e))?;
    let mut writer = csv::Writer::from_writer(GzEncoder::new(file, Compression::default()));
    // Header is emitted from the row struct; an empty day still gets one.
    if candles.is_empty() {
        writer.write_record(COLUMNS).map_err(to_io)?;
    }
    for candle in candles {
        writer.serialize(CandleRow::from(candle)).map_err(to_io)?;
    }
    let encoder = writer
        .into_inner()
        .map_err(|e| StoreError::io(path, io::Error::other(e.to_string())))?;
    let file = encoder.finish().map_err(|e| StoreError::io(path, e))?;
    file.sync_all().map_err(|e| StoreError::io(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.{}.tmp", std::process::id()))
}

fn check_key_component(part: &str) -> Result<&str, StoreError> {
    let bad = part.is_empty()
        || part == "."
        || part == ".."
        || part.contains(['/', '\\'])
        || part.chars().any(char::is_control);
    if bad {
        Err(StoreError::InvalidKey(part.to_string()))
    } else {
        Ok(part)
    }
}

fn parse_day_file_name(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_suffix(CANDLE_FILE_EXT)?;
    crate::domain::date_range::parse_day(stem).ok()
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))? {
        paths.push(entry.map_err(|e| StoreError::io(dir, e))?.path());
    }
    paths.sort();
    Ok(paths)
}

fn file_len(path: &Path) -> Result<u64, StoreError> {
    fs::metadata(path)
        .map(|m| if m.is_file() { m.len() } else { 0 })
        .map_err(|e| StoreError::io(path, e))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
