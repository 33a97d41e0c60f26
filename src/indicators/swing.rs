use rust_decimal::Decimal;

use crate::types::CandleSeries;

/// `high_i` is a swing high iff it equals the max high in the `[i-w, i+w]` window;
/// symmetric for lows. Requires at least `2w+1` candles, else returns empty (§4.B, §8).
pub fn swing_highs(series: &CandleSeries, window: usize) -> Vec<Decimal> {
    let candles = series.as_slice();
    let required = 2 * window + 1;
    if candles.len() < required {
        return Vec::new();
    }

    let mut out = Vec::new();
    for i in window..candles.len() - window {
        let lo = i - window;
        let hi = i + window;
        let max_high = candles[lo..=hi].iter().map(|c| c.high).max().unwrap();
        if candles[i].high == max_high {
            out.push(candles[i].high);
        }
    }
    out
}

pub fn swing_lows(series: &CandleSeries, window: usize) -> Vec<Decimal> {
    let candles = series.as_slice();
    let required = 2 * window + 1;
    if candles.len() < required {
        return Vec::new();
    }

    let mut out = Vec::new();
    for i in window..candles.len() - window {
        let lo = i - window;
        let hi = i + window;
        let min_low = candles[lo..=hi].iter().map(|c| c.low).min().unwrap();
        if candles[i].low == min_low {
            out.push(candles[i].low);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::types::Candle;
    use rust_decimal_macros::dec;

    fn series_of(highs: &[Decimal], lows: &[Decimal]) -> CandleSeries {
        let candles = highs
            .iter()
            .zip(lows)
            .enumerate()
            .map(|(i, (&high, &low))| Candle {
                timestamp: Utc.timestamp_opt(i as i64 * 60, 0).unwrap(),
                open: (high + low) / dec!(2),
                high,
                low,
                close: (high + low) / dec!(2),
                volume: dec!(1),
            })
            .collect();
        CandleSeries::from_sorted(candles)
    }

    #[test]
    fn too_few_candles_yields_no_swing_points() {
        let series = series_of(&[dec!(10), dec!(11)], &[dec!(9), dec!(9.5)]);
        assert!(swing_highs(&series, 2).is_empty());
        assert!(swing_lows(&series, 2).is_empty());
    }

    #[test]
    fn detects_a_centered_swing_high_and_low() {
        let highs = [dec!(10), dec!(11), dec!(15), dec!(11), dec!(10)];
        let lows = [dec!(9), dec!(8), dec!(4), dec!(8), dec!(9)];
        let series = series_of(&highs, &lows);
        assert_eq!(swing_highs(&series, 2), vec![dec!(15)]);
        assert_eq!(swing_lows(&series, 2), vec![dec!(4)]);
    }
}
