//! Candles → coarser N-second candles.

use super::floor_to;
use crate::domain::{Candle, CandleError};
use chrono::{DateTime, Utc};

/// Re-bucket candles into left-aligned windows of `interval_secs`.
///
/// Windows are aligned to the Unix epoch, so a 60s series always starts on
/// whole minutes. Input must be strictly ascending by `bucket_start`; a
/// duplicate or a step backwards is reported as `DataCorruption` rather than
/// silently sorted. Windows without input candles are omitted.
///
/// Input coarser than `interval_secs` is accepted: each candle lands in the
/// window containing its bucket start.
pub fn resample(candles: &[Candle], interval_secs: u32) -> Result<Vec<Candle>, CandleError> {
    if interval_secs == 0 {
        return Err(CandleError::InvalidInput(
            "resample interval must be at least 1 second".into(),
        ));
    }
    let width = i64::from(interval_secs);

    let mut out: Vec<Candle> = Vec::new();
    let mut previous: Option<DateTime<Utc>> = None;

    for (index, candle) in candles.iter().enumerate() {
        let start = candle.bucket_start;
        if let Some(prev) = previous {
            if start == prev {
                return Err(CandleError::DataCorruption(format!(
                    "duplicate bucket {} at position {index}",
                    candle.bucket_start
                )));
            }
            if start < prev {
                return Err(CandleError::DataCorruption(format!(
                    "bucket {} at position {index} precedes the previous bucket",
                    candle.bucket_start
                )));
            }
        }
        previous = Some(start);

        let window = floor_to(candle.bucket_start, width);
        match out.last_mut() {
            Some(current) if current.bucket_start == window => current.absorb(candle),
            _ => out.push(Candle {
                bucket_start: window,
                ..candle.clone()
            }),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn candle(offset_secs: i64, open: f64, high: f64, low: f64, close: f64, buy: f64, sell: f64) -> Candle {
        Candle {
            bucket_start: base() + Duration::seconds(offset_secs),
            open,
            high,
            low,
            close,
            volume: buy + sell,
            buy_volume: buy,
            sell_volume: sell,
        }
    }

    #[test]
    fn merges_first_max_min_last_sum() {
        let input = vec![
            candle(0, 10.0, 12.0, 9.0, 11.0, 1.0, 0.0),
            candle(1, 11.0, 15.0, 10.0, 14.0, 0.0, 2.0),
            candle(2, 14.0, 14.5, 8.0, 9.0, 3.0, 1.0),
        ];
        let out = resample(&input, 60).unwrap();
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert_eq!(c.bucket_start, base());
        assert_eq!((c.open, c.high, c.low, c.close), (10.0, 15.0, 8.0, 9.0));
        assert_eq!((c.volume, c.buy_volume, c.sell_volume), (7.0, 4.0, 3.0));
    }

    #[test]
    fn windows_are_left_aligned_to_epoch() {
        let input = vec![
            candle(59, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0),
            candle(60, 2.0, 2.0, 2.0, 2.0, 1.0, 0.0),
            candle(119, 3.0, 3.0, 3.0, 3.0, 1.0, 0.0),
        ];
        let out = resample(&input, 60).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].bucket_start, base());
        assert_eq!(out[1].bucket_start, base() + Duration::seconds(60));
        assert_eq!((out[1].open, out[1].close), (2.0, 3.0));
    }

    #[test]
    fn empty_windows_are_omitted() {
        let input = vec![
            candle(0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0),
            candle(600, 2.0, 2.0, 2.0, 2.0, 1.0, 0.0),
        ];
        let out = resample(&input, 60).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].bucket_start, base() + Duration::seconds(600));
    }

    #[test]
    fn interval_one_is_identity_for_second_candles() {
        let input = vec![
            candle(0, 1.0, 2.0, 0.5, 1.5, 1.0, 1.0),
            candle(1, 1.5, 1.6, 1.4, 1.4, 0.0, 1.0),
        ];
        assert_eq!(resample(&input, 1).unwrap(), input);
    }

    #[test]
    fn accepts_coarser_input() {
        let input = vec![
            candle(0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0),
            candle(300, 2.0, 2.0, 2.0, 2.0, 1.0, 0.0),
        ];
        let out = resample(&input, 30).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn zero_interval_is_invalid_input() {
        assert!(matches!(resample(&[], 0), Err(CandleError::InvalidInput(_))));
    }

    #[test]
    fn duplicate_bucket_is_corruption() {
        let input = vec![
            candle(5, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0),
            candle(5, 2.0, 2.0, 2.0, 2.0, 1.0, 0.0),
        ];
        assert!(matches!(
            resample(&input, 60),
            Err(CandleError::DataCorruption(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn sub_second_buckets_are_distinct() {
        let half = Candle {
            bucket_start: base() + Duration::milliseconds(500),
            ..candle(0, 2.0, 3.0, 2.0, 3.0, 0.0, 1.0)
        };
        let input = vec![candle(0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0), half];

        let out = resample(&input, 1).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].bucket_start, base());
        assert_eq!((out[0].open, out[0].high, out[0].close), (1.0, 3.0, 3.0));
        assert_eq!(out[0].volume, 2.0);

        let backwards = vec![input[1].clone(), input[0].clone()];
        assert!(matches!(
            resample(&backwards, 1),
            Err(CandleError::DataCorruption(_))
        ));
    }

    #[test]
    fn backwards_step_is_corruption() {
        let input = vec![
            candle(5, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0),
            candle(4, 2.0, 2.0, 2.0, 2.0, 1.0, 0.0),
        ];
        assert!(matches!(
            resample(&input, 60),
            Err(CandleError::DataCorruption(_))
        ));
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(resample(&[], 60).unwrap().is_empty());
    }
}
