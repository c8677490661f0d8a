//! Domain types for candlevault

pub mod candle;
pub mod date_range;
pub mod trade;

pub use candle::{Candle, CandleError};
pub use date_range::{DateRange, DateRangeError};
pub use trade::{Side, TradeRecord};
