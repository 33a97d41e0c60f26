use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::fvg::GapDirection;
use crate::types::CandleSeries;

/// A candle whose body preceded a displacement move, taken as presumed
/// institutional interest (§4.B).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderBlock {
    pub direction: GapDirection,
    pub low: Decimal,
    pub high: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Scans the last `lookback` candles for Order Blocks. For `i` in `[2, L-3]`: a
/// bullish OB is a bearish-bodied candle `i` followed two candles later by an
/// upward move exceeding `threshold` (as a fraction of `close_i`); bearish is the
/// mirror (§4.B). Fewer than 5 candles in the window yields none.
pub fn detect_order_blocks(series: &CandleSeries, lookback: usize, threshold: Decimal) -> Vec<OrderBlock> {
    let all = series.as_slice();
    let window = &all[all.len().saturating_sub(lookback)..];
    if window.len() < 5 {
        return Vec::new();
    }

    let mut out = Vec::new();
    for i in 2..window.len() - 2 {
        let candle = &window[i];
        let future = &window[i + 2];
        if candle.close.is_zero() {
            continue;
        }
        let move_fraction = (future.close - candle.close) / candle.close;

        if candle.is_bearish() && move_fraction > threshold {
            out.push(OrderBlock {
                direction: GapDirection::Bullish,
                low: candle.low,
                high: candle.high,
                timestamp: candle.timestamp,
            });
        } else if candle.is_bullish() && -move_fraction > threshold {
            out.push(OrderBlock {
                direction: GapDirection::Bearish,
                low: candle.low,
                high: candle.high,
                timestamp: candle.timestamp,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candle;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn candle(ts: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume: dec!(1),
        }
    }

    #[test]
    fn detects_bullish_order_block_before_upward_displacement() {
        let series = CandleSeries::from_sorted(vec![
            candle(0, dec!(100), dec!(101), dec!(99), dec!(100.5)),
            candle(60, dec!(100.5), dec!(101), dec!(99.5), dec!(100.2)),
            candle(120, dec!(100.2), dec!(100.5), dec!(95), dec!(96)), // bearish body
            candle(180, dec!(96), dec!(102), dec!(96), dec!(101)),
            candle(240, dec!(101), dec!(110), dec!(101), dec!(109)), // displacement up
        ]);
        let obs = detect_order_blocks(&series, 20, dec!(0.05));
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].direction, GapDirection::Bullish);
        assert_eq!(obs[0].low, dec!(95));
        assert_eq!(obs[0].high, dec!(100.5));
    }

    #[test]
    fn fewer_than_five_candles_yields_no_order_block() {
        let series = CandleSeries::from_sorted(vec![
            candle(0, dec!(1), dec!(1), dec!(1), dec!(1)),
            candle(60, dec!(1), dec!(1), dec!(1), dec!(1)),
        ]);
        assert!(detect_order_blocks(&series, 20, dec!(0.05)).is_empty());
    }
}
