//! In-memory source adapter with scripted per-day outcomes.
//!
//! Used for offline runs and tests. Locators look like
//! `fixture://{exchange}/{symbol}/{YYYYMMDD}`; any day without a scripted
//! outcome answers `NotFound`. The adapter counts fetches and tracks the peak
//! number of fetches running at the same time.

use super::source::{FetchError, SourceAdapter};
use crate::domain::date_range::DAY_FORMAT;
use crate::domain::TradeRecord;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted in-memory source.
#[derive(Debug)]
pub struct FixtureSource {
    exchange: String,
    days: HashMap<String, Result<Vec<TradeRecord>, FetchError>>,
    latency: Duration,
    fetches: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl FixtureSource {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            days: HashMap::new(),
            latency: Duration::ZERO,
            fetches: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
        }
    }

    /// Simulated network latency per fetch.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Serve `trades` for one symbol-day.
    pub fn with_trades(mut self, symbol: &str, date: NaiveDate, trades: Vec<TradeRecord>) -> Self {
        let locator = self.daily_url(symbol, date);
        self.days.insert(locator, Ok(trades));
        self
    }

    /// Fail one symbol-day with the given error.
    pub fn with_error(mut self, symbol: &str, date: NaiveDate, error: FetchError) -> Self {
        let locator = self.daily_url(symbol, date);
        self.days.insert(locator, Err(error));
        self
    }

    /// Total number of `fetch` calls so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously running fetches observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }
}

impl SourceAdapter for FixtureSource {
    fn exchange(&self) -> &str {
        &self.exchange
    }

    fn daily_url(&self, symbol: &str, date: NaiveDate) -> String {
        format!(
            "fixture://{}/{symbol}/{}",
            self.exchange,
            date.format(DAY_FORMAT)
        )
    }

    fn fetch(&self, locator: &str) -> Result<Vec<TradeRecord>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now_active, Ordering::SeqCst);

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let outcome = match self.days.get(locator) {
            Some(scripted) => scripted.clone(),
            None => Err(FetchError::NotFound {
                locator: locator.to_string(),
            }),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}
