//! Integration tests for building N-second series from the daily store.

use candlevault_core::candles::resample;
use candlevault_core::data::{
    build, ingest, write_series, BuildError, DailyStore, FixtureSource, NoProgress, StoreError,
};
use candlevault_core::domain::{Candle, DateRange, Side, TradeRecord};
use chrono::{Duration, NaiveDate, TimeZone, Utc};

// ── Helpers ──────────────────────────────────────────────────────────

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
}

/// One-second candles for every second of `[from, from + count)` on `date`.
fn seconds(date: NaiveDate, from: i64, count: i64, base_price: f64) -> Vec<Candle> {
    let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap());
    (from..from + count)
        .map(|i| {
            let price = base_price + (i % 11) as f64;
            Candle {
                bucket_start: midnight + Duration::seconds(i),
                open: price,
                high: price + 0.5,
                low: price - 0.5,
                close: price + 0.25,
                volume: 2.0,
                buy_volume: 1.5,
                sell_volume: 0.5,
            }
        })
        .collect()
}

fn store_with(days: &[(NaiveDate, Vec<Candle>)]) -> (tempfile::TempDir, DailyStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = DailyStore::new(dir.path());
    for (date, candles) in days {
        store.write("bybit", "BTCUSDT", *date, candles).unwrap();
    }
    (dir, store)
}

// ── Gaps and empty ranges ────────────────────────────────────────────

#[test]
fn missing_middle_day_is_skipped_not_fatal() {
    let (_dir, store) = store_with(&[
        (d(1), seconds(d(1), 0, 120, 100.0)),
        (d(3), seconds(d(3), 0, 120, 200.0)),
    ]);
    let range = DateRange::new(d(1), d(3)).unwrap();

    let series = build(&store, "bybit", "BTCUSDT", &range, 60).unwrap();

    assert_eq!(series.days_found, vec![d(1), d(3)]);
    assert_eq!(series.days_missing, vec![d(2)]);
    assert_eq!(series.candles.len(), 4);
    for window in series.candles.windows(2) {
        assert!(window[0].bucket_start < window[1].bucket_start);
    }
    assert!(series.candles.iter().all(|c| c.bucket_secs() % 60 == 0));
    assert!(series.candles.iter().all(|c| c.volume == 120.0));
}

#[test]
fn range_with_no_stored_day_is_no_data() {
    let (_dir, store) = store_with(&[(d(10), seconds(d(10), 0, 5, 1.0))]);
    let range = DateRange::new(d(1), d(9)).unwrap();

    let err = build(&store, "bybit", "BTCUSDT", &range, 60).unwrap_err();
    match err {
        BuildError::NoData { exchange, symbol, range: r } => {
            assert_eq!((exchange.as_str(), symbol.as_str()), ("bybit", "BTCUSDT"));
            assert_eq!(r, range);
        }
        other => panic!("expected NoData, got {other:?}"),
    }
}

#[test]
fn unknown_symbol_is_no_data() {
    let (_dir, store) = store_with(&[(d(1), seconds(d(1), 0, 5, 1.0))]);
    let err = build(&store, "bybit", "ETHUSDT", &DateRange::day(d(1)), 60).unwrap_err();
    assert!(err.is_no_data());
}

// ── Concatenate, then resample ───────────────────────────────────────

#[test]
fn window_across_midnight_is_built_from_both_days() {
    // 86400 is not a multiple of 7, so one 7s window spans midnight.
    let last_of_d1 = seconds(d(1), 86_390, 10, 50.0);
    let first_of_d2 = seconds(d(2), 0, 10, 80.0);
    let (_dir, store) = store_with(&[(d(1), last_of_d1.clone()), (d(2), first_of_d2.clone())]);
    let range = DateRange::new(d(1), d(2)).unwrap();

    let series = build(&store, "bybit", "BTCUSDT", &range, 7).unwrap();

    let concatenated: Vec<Candle> = last_of_d1.iter().chain(&first_of_d2).cloned().collect();
    assert_eq!(series.candles, resample(&concatenated, 7).unwrap());

    let per_day: Vec<Candle> = resample(&last_of_d1, 7)
        .unwrap()
        .into_iter()
        .chain(resample(&first_of_d2, 7).unwrap())
        .collect();
    assert!(per_day.len() > series.candles.len());

    let midnight = Utc.from_utc_datetime(&d(2).and_hms_opt(0, 0, 0).unwrap());
    let straddling = series
        .candles
        .iter()
        .find(|c| c.bucket_start < midnight && c.bucket_start + Duration::seconds(7) > midnight)
        .expect("a window spans midnight");
    assert!(straddling.open < 80.0, "open comes from day one");
    assert!(straddling.close >= 80.0, "close comes from day two");
}

// ── Storage errors ───────────────────────────────────────────────────

#[test]
fn corrupt_day_aborts_the_build() {
    let (_dir, store) = store_with(&[
        (d(1), seconds(d(1), 0, 60, 10.0)),
        (d(3), seconds(d(3), 0, 60, 10.0)),
    ]);
    let bad = store.day_path("bybit", "BTCUSDT", d(2)).unwrap();
    std::fs::write(&bad, b"\x1f\x8b not really gzip").unwrap();

    let err = build(&store, "bybit", "BTCUSDT", &DateRange::new(d(1), d(3)).unwrap(), 60)
        .unwrap_err();

    match err {
        BuildError::Storage(StoreError::Corrupt { path, .. }) => assert_eq!(path, bad),
        other => panic!("expected corrupt store error, got {other:?}"),
    }
}

// ── End to end ───────────────────────────────────────────────────────

#[test]
fn ingest_then_build_then_write_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let store = DailyStore::new(dir.path().join("store"));
    let trades = |date: NaiveDate| -> Vec<TradeRecord> {
        let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap());
        (0..600)
            .map(|i| {
                TradeRecord::new(
                    midnight + Duration::milliseconds(i * 500),
                    if i % 2 == 0 { Side::Buy } else { Side::Sell },
                    1.0,
                    1000.0 + (i % 13) as f64,
                )
            })
            .collect()
    };
    let source = FixtureSource::new("bybit")
        .with_trades("BTCUSDT", d(1), trades(d(1)))
        .with_trades("BTCUSDT", d(2), trades(d(2)));
    let range = DateRange::new(d(1), d(2)).unwrap();

    let report = ingest("bybit", "BTCUSDT", &range, &source, &store, 2, &NoProgress).unwrap();
    assert_eq!(report.succeeded, vec![d(1), d(2)]);

    let series = build(&store, "bybit", "BTCUSDT", &range, 60).unwrap();
    // 600 trades at 2/s cover 300 seconds: five 1-minute candles per day.
    assert_eq!(series.candles.len(), 10);
    for candle in &series.candles {
        assert!(candle.is_consistent());
        assert_eq!(candle.volume, 120.0);
        assert_eq!(candle.buy_volume, 60.0);
    }

    let out_dir = dir.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();
    let path = write_series(&series, &out_dir).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "bybit_BTCUSDT_20240201_20240202_60s.csv.gz"
    );
    assert_eq!(candlevault_core::data::store::read_candles(&path).unwrap(), series.candles);
}
