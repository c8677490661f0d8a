//! Pure candle transforms: trades → 1-second candles, candles → N-second candles.
//!
//! Nothing in here performs I/O. Both transforms share the same merge rule:
//! first open, max high, min low, last close, summed volumes.

pub mod aggregate;
pub mod resample;

pub use aggregate::aggregate;
pub use resample::resample;

use crate::domain::Candle;
use chrono::{DateTime, Duration, Utc};

/// Floor an instant to the preceding multiple of `width_secs` since the epoch.
pub(crate) fn floor_to(ts: DateTime<Utc>, width_secs: i64) -> DateTime<Utc> {
    let offset = ts.timestamp().rem_euclid(width_secs);
    ts - Duration::seconds(offset) - Duration::nanoseconds(i64::from(ts.timestamp_subsec_nanos()))
}

impl Candle {
    /// Fold a later candle of the same bucket into this one.
    pub(crate) fn absorb(&mut self, next: &Candle) {
        self.high = self.high.max(next.high);
        self.low = self.low.min(next.low);
        self.close = next.close;
        self.volume += next.volume;
        self.buy_volume += next.buy_volume;
        self.sell_volume += next.sell_volume;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn floor_to_minute_boundary() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 10, 7, 42).unwrap()
            + Duration::milliseconds(250);
        assert_eq!(
            floor_to(ts, 60),
            Utc.with_ymd_and_hms(2024, 1, 2, 10, 7, 0).unwrap()
        );
        assert_eq!(
            floor_to(ts, 1),
            Utc.with_ymd_and_hms(2024, 1, 2, 10, 7, 42).unwrap()
        );
    }

    #[test]
    fn floor_before_epoch_goes_down() {
        let ts = Utc.timestamp_opt(-1, 500_000_000).unwrap();
        assert_eq!(floor_to(ts, 60).timestamp(), -60);
    }
}
