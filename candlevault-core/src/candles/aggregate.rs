//! Trades → 1-second candles.

use super::floor_to;
use crate::domain::{Candle, CandleError, Side, TradeRecord};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Aggregate trades into 1-second OHLCV candles.
///
/// Trades are bucketed by flooring their timestamp to the second. Within a
/// bucket, open and close follow the order of `trades` (ties on timestamp are
/// resolved by position, so callers pass trades in source order). Empty
/// buckets produce no candle. Output is ascending by bucket start.
///
/// Every trade is validated before any aggregation happens.
pub fn aggregate(trades: &[TradeRecord]) -> Result<Vec<Candle>, CandleError> {
    if let Some((index, bad)) = trades.iter().enumerate().find(|(_, t)| !t.is_valid()) {
        return Err(CandleError::InvalidInput(format!(
            "trade #{index} at {}: price={} size={}",
            bad.timestamp, bad.price, bad.size
        )));
    }

    let mut buckets: BTreeMap<i64, Candle> = BTreeMap::new();
    for trade in trades {
        let single = single_trade_candle(trade);
        match buckets.entry(trade.second_bucket()) {
            Entry::Vacant(slot) => {
                slot.insert(single);
            }
            Entry::Occupied(mut slot) => slot.get_mut().absorb(&single),
        }
    }

    Ok(buckets.into_values().collect())
}

fn single_trade_candle(trade: &TradeRecord) -> Candle {
    let (buy_volume, sell_volume) = match trade.side {
        Side::Buy => (trade.size, 0.0),
        Side::Sell => (0.0, trade.size),
    };
    Candle {
        bucket_start: floor_to(trade.timestamp, 1),
        open: trade.price,
        high: trade.price,
        low: trade.price,
        close: trade.price,
        volume: trade.size,
        buy_volume,
        sell_volume,
    }
}
