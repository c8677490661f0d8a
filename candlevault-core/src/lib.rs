//! candlevault core: a local archive of daily exchange trades as 1-second
//! candles, and the derivation of N-second series from it.
//!
//! - Domain types (trades, candles, date ranges)
//! - Pure candle transforms: aggregation to 1 second, resampling to N seconds
//! - Source adapters behind a registry (Bybit, in-memory fixture)
//! - The daily store: one gzip CSV per (exchange, symbol, date)
//! - Ingestion over a bounded worker pool, and the build pipeline
//! - Project directory and TOML configuration

pub mod candles;
pub mod config;
pub mod data;
pub mod domain;
