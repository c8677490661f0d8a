//! Ingestion pipeline: fetch → aggregate → store, one unit per date.
//!
//! Dates already in the store are skipped before any work is queued. The rest
//! go through a fixed pool of worker threads fed from a bounded channel; each
//! worker sends `(date, outcome)` to a single collector that assembles the
//! report in date order. A failed date never cancels its siblings, and nothing
//! is retried: a failed date stays absent until the next run.

use super::source::{FetchError, SourceAdapter};
use super::store::DailyStore;
use crate::candles::aggregate;
use crate::data::store::StoreError;
use crate::domain::DateRange;
use chrono::NaiveDate;
use crossbeam_channel::{bounded, unbounded};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid ingestion request: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a date produced no new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The day file was already present; no network call was made.
    AlreadyStored,
    /// The source has no data for that day (404 or an empty dump).
    NoData,
}

/// Category of a failed date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transient,
    Permanent,
    InvalidData,
    Storage,
}

/// Result of processing a single date.
#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    Stored { candles: usize },
    Skipped(SkipReason),
    Failed { kind: FailureKind, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDay {
    pub date: NaiveDate,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedDay {
    pub date: NaiveDate,
    pub kind: FailureKind,
    pub reason: String,
}

/// Summary of one ingestion run. Every list is ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub exchange: String,
    pub symbol: String,
    pub succeeded: Vec<NaiveDate>,
    pub skipped: Vec<SkippedDay>,
    pub failed: Vec<FailedDay>,
}

impl IngestReport {
    fn from_outcomes(exchange: &str, symbol: &str, outcomes: BTreeMap<NaiveDate, DayOutcome>) -> Self {
        let mut report = Self {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            succeeded: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        };
        for (date, outcome) in outcomes {
            match outcome {
                DayOutcome::Stored { .. } => report.succeeded.push(date),
                DayOutcome::Skipped(reason) => report.skipped.push(SkippedDay { date, reason }),
                DayOutcome::Failed { kind, reason } => {
                    report.failed.push(FailedDay { date, kind, reason })
                }
            }
        }
        report
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Progress callbacks for an ingestion run.
///
/// Called from the collecting thread only, in completion order.
pub trait IngestProgress: Send {
    /// Called once the existence check has split the dates.
    fn on_batch_start(&self, exchange: &str, symbol: &str, pending: usize, already_stored: usize);

    /// Called as each pending date finishes.
    fn on_day_complete(&self, date: NaiveDate, outcome: &DayOutcome, done: usize, total: usize);

    /// Called when the report is assembled.
    fn on_batch_complete(&self, report: &IngestReport);
}

/// Reports progress through `tracing`.
pub struct LogProgress;

impl IngestProgress for LogProgress {
    fn on_batch_start(&self, exchange: &str, symbol: &str, pending: usize, already_stored: usize) {
        tracing::info!(exchange, symbol, pending, already_stored, "ingestion started");
    }

    fn on_day_complete(&self, date: NaiveDate, outcome: &DayOutcome, done: usize, total: usize) {
        match outcome {
            DayOutcome::Stored { candles } => {
                tracing::info!(%date, candles, "[{done}/{total}] stored");
            }
            DayOutcome::Skipped(reason) => {
                tracing::info!(%date, ?reason, "[{done}/{total}] skipped");
            }
            DayOutcome::Failed { kind, reason } => {
                tracing::warn!(%date, ?kind, reason = %reason, "[{done}/{total}] failed");
            }
        }
    }

    fn on_batch_complete(&self, report: &IngestReport) {
        tracing::info!(
            exchange = %report.exchange,
            symbol = %report.symbol,
            succeeded = report.succeeded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "ingestion finished"
        );
    }
}

/// Discards progress.
pub struct NoProgress;

impl IngestProgress for NoProgress {
    fn on_batch_start(&self, _: &str, _: &str, _: usize, _: usize) {}
    fn on_day_complete(&self, _: NaiveDate, _: &DayOutcome, _: usize, _: usize) {}
    fn on_batch_complete(&self, _: &IngestReport) {}
}

/// Ingest every day of `range` for one (exchange, symbol).
pub fn ingest(
    exchange: &str,
    symbol: &str,
    range: &DateRange,
    adapter: &dyn SourceAdapter,
    store: &DailyStore,
    max_concurrency: usize,
    progress: &dyn IngestProgress,
) -> Result<IngestReport, IngestError> {
    let dates: Vec<NaiveDate> = range.days().collect();
    ingest_dates(exchange, symbol, &dates, adapter, store, max_concurrency, progress)
}

/// Ingest an arbitrary set of dates. Order and duplicates in `dates` do not
/// affect the outcome or the report.
pub fn ingest_dates(
    exchange: &str,
    symbol: &str,
    dates: &[NaiveDate],
    adapter: &dyn SourceAdapter,
    store: &DailyStore,
    max_concurrency: usize,
    progress: &dyn IngestProgress,
) -> Result<IngestReport, IngestError> {
    if max_concurrency == 0 {
        return Err(IngestError::InvalidInput(
            "max_concurrency must be at least 1".into(),
        ));
    }

    let mut outcomes: BTreeMap<NaiveDate, DayOutcome> = BTreeMap::new();
    let mut pending: Vec<NaiveDate> = Vec::new();
    for date in dates.iter().copied().collect::<BTreeSet<_>>() {
        if store.exists(exchange, symbol, date)? {
            outcomes.insert(date, DayOutcome::Skipped(SkipReason::AlreadyStored));
        } else {
            pending.push(date);
        }
    }

    let total = pending.len();
    progress.on_batch_start(exchange, symbol, total, outcomes.len());

    if total > 0 {
        let workers = max_concurrency.min(total);
        tracing::debug!(exchange, symbol, workers, pending = total, "starting worker pool");

        let (job_tx, job_rx) = bounded::<NaiveDate>(workers);
        let (result_tx, result_rx) = unbounded::<(NaiveDate, DayOutcome)>();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for date in job_rx.iter() {
                        let outcome = process_day(exchange, symbol, date, adapter, store);
                        if result_tx.send((date, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(result_tx);

            scope.spawn(move || {
                for date in pending {
                    if job_tx.send(date).is_err() {
                        break;
                    }
                }
            });

            let mut done = 0;
            for (date, outcome) in result_rx.iter() {
                done += 1;
                progress.on_day_complete(date, &outcome, done, total);
                outcomes.insert(date, outcome);
            }
        });
    }

    let report = IngestReport::from_outcomes(exchange, symbol, outcomes);
    progress.on_batch_complete(&report);
    Ok(report)
}

/// Fetch, aggregate and persist one date.
fn process_day(
    exchange: &str,
    symbol: &str,
    date: NaiveDate,
    adapter: &dyn SourceAdapter,
    store: &DailyStore,
) -> DayOutcome {
    let locator = adapter.daily_url(symbol, date);
    tracing::debug!(%date, %locator, "fetching");

    let trades = match adapter.fetch(&locator) {
        Ok(trades) => trades,
        Err(FetchError::NotFound { .. }) => return DayOutcome::Skipped(SkipReason::NoData),
        Err(FetchError::Transient(reason)) => {
            return DayOutcome::Failed {
                kind: FailureKind::Transient,
                reason,
            }
        }
        Err(FetchError::Permanent(reason)) => {
            return DayOutcome::Failed {
                kind: FailureKind::Permanent,
                reason,
            }
        }
    };
    if trades.is_empty() {
        return DayOutcome::Skipped(SkipReason::NoData);
    }

    let candles = match aggregate(&trades) {
        Ok(candles) => candles,
        Err(e) => {
            return DayOutcome::Failed {
                kind: FailureKind::InvalidData,
                reason: e.to_string(),
            }
        }
    };

    match store.write(exchange, symbol, date, &candles) {
        Ok(path) => {
            tracing::debug!(%date, path = %path.display(), trades = trades.len(), "day written");
            DayOutcome::Stored {
                candles: candles.len(),
            }
        }
        Err(e) => DayOutcome::Failed {
            kind: FailureKind::Storage,
            reason: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixture::FixtureSource;
    use crate::domain::{Side, TradeRecord};
    use chrono::{TimeZone, Utc};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn trade(day: u32, sec: u32, price: f64) -> TradeRecord {
        TradeRecord::new(
            Utc.with_ymd_and_hms(2024, 3, day, 0, 0, sec).unwrap(),
            Side::Buy,
            1.0,
            price,
        )
    }

    #[test]
    fn classifies_every_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let store = DailyStore::new(dir.path());
        store.write("fx", "BTC", d(1), &[]).unwrap();

        let source = FixtureSource::new("fx")
            .with_trades("BTC", d(2), vec![trade(2, 0, 10.0), trade(2, 1, 11.0)])
            .with_trades("BTC", d(3), vec![])
            .with_error("BTC", d(4), FetchError::Transient("timeout".into()))
            .with_error("BTC", d(5), FetchError::Permanent("bad gzip".into()))
            .with_trades("BTC", d(6), vec![trade(6, 0, -1.0)]);

        let range = DateRange::new(d(1), d(7)).unwrap();
        let report = ingest("fx", "BTC", &range, &source, &store, 4, &NoProgress).unwrap();

        assert_eq!(report.succeeded, vec![d(2)]);
        assert_eq!(
            report.skipped,
            vec![
                SkippedDay { date: d(1), reason: SkipReason::AlreadyStored },
                SkippedDay { date: d(3), reason: SkipReason::NoData },
                SkippedDay { date: d(7), reason: SkipReason::NoData },
            ]
        );
        let kinds: Vec<_> = report.failed.iter().map(|f| (f.date, f.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (d(4), FailureKind::Transient),
                (d(5), FailureKind::Permanent),
                (d(6), FailureKind::InvalidData),
            ]
        );
        assert_eq!(report.total(), 7);
        assert!(!report.all_succeeded());
        // The pre-existing day was never fetched.
        assert_eq!(source.fetch_count(), 6);
    }

    #[test]
    fn zero_concurrency_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let store = DailyStore::new(dir.path());
        let source = FixtureSource::new("fx");
        let range = DateRange::day(d(1));
        assert!(matches!(
            ingest("fx", "BTC", &range, &source, &store, 0, &NoProgress),
            Err(IngestError::InvalidInput(_))
        ));
    }

    #[test]
    fn duplicate_dates_are_processed_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = DailyStore::new(dir.path());
        let source = FixtureSource::new("fx").with_trades("BTC", d(2), vec![trade(2, 0, 10.0)]);

        let report =
            ingest_dates("fx", "BTC", &[d(2), d(2), d(2)], &source, &store, 3, &NoProgress)
                .unwrap();

        assert_eq!(report.succeeded, vec![d(2)]);
        assert_eq!(source.fetch_count(), 1);
    }

    #[test]
    fn report_serializes_with_snake_case_reasons() {
        let report = IngestReport {
            exchange: "bybit".into(),
            symbol: "BTCUSDT".into(),
            succeeded: vec![],
            skipped: vec![SkippedDay { date: d(1), reason: SkipReason::AlreadyStored }],
            failed: vec![FailedDay {
                date: d(2),
                kind: FailureKind::InvalidData,
                reason: "bad".into(),
            }],
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""reason":"already_stored""#));
        assert!(json.contains(r#""kind":"invalid_data""#));
        assert!(json.contains(r#""date":"2024-03-01""#));
    }
}
