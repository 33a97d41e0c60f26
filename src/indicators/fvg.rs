use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::CandleSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapDirection {
    Bullish,
    Bearish,
}

/// A three-candle Fair Value Gap (§4.B).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fvg {
    pub direction: GapDirection,
    pub gap_low: Decimal,
    pub gap_high: Decimal,
    pub center_timestamp: DateTime<Utc>,
}

/// Scans the last `lookback` candles for Fair Value Gaps. For `i` in `[1, L-2]`
/// (indices into the trailing window): a bullish gap is `high_{i-1} < low_{i+1}`,
/// a bearish gap is `low_{i-1} > high_{i+1}`. Fewer than 3 candles yields none (§8).
pub fn detect_fvgs(series: &CandleSeries, lookback: usize) -> Vec<Fvg> {
    let all = series.as_slice();
    if all.len() < 3 {
        return Vec::new();
    }
    let window = &all[all.len().saturating_sub(lookback)..];
    if window.len() < 3 {
        return Vec::new();
    }

    let mut out = Vec::new();
    for i in 1..window.len() - 1 {
        let prev = &window[i - 1];
        let next = &window[i + 1];

        if prev.high < next.low {
            out.push(Fvg {
                direction: GapDirection::Bullish,
                gap_low: prev.high,
                gap_high: next.low,
                center_timestamp: window[i].timestamp,
            });
        } else if prev.low > next.high {
            out.push(Fvg {
                direction: GapDirection::Bearish,
                gap_low: next.high,
                gap_high: prev.low,
                center_timestamp: window[i].timestamp,
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
    fn fewer_than_three_candles_yields_no_fvg() {
        let series = CandleSeries::from_sorted(vec![
            candle(0, dec!(1), dec!(1), dec!(1), dec!(1)),
            candle(60, dec!(1), dec!(1), dec!(1), dec!(1)),
        ]);
        assert!(detect_fvgs(&series, 20).is_empty());
    }

    #[test]
    fn bullish_gap_has_gap_high_greater_than_gap_low() {
        let series = CandleSeries::from_sorted(vec![
            candle(0, dec!(99), dec!(100), dec!(98), dec!(99.5)),
            candle(60, dec!(100), dec!(101), dec!(100), dec!(100.5)),
            candle(120, dec!(102), dec!(103), dec!(102), dec!(102.5)),
        ]);
        let gaps = detect_fvgs(&series, 20);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].direction, GapDirection::Bullish);
        assert!(gaps[0].gap_high > gaps[0].gap_low);
        assert_eq!(gaps[0].gap_low, dec!(100));
        assert_eq!(gaps[0].gap_high, dec!(102));
    }

    #[test]
    fn bearish_gap_has_gap_high_greater_than_gap_low() {
        let series = CandleSeries::from_sorted(vec![
            candle(0, dec!(100), dec!(103), dec!(99), dec!(99.5)),
            candle(60, dec!(98), dec!(99), dec!(95), dec!(95.5)),
            candle(120, dec!(93), dec!(94), dec!(90), dec!(93.5)),
        ]);
        let gaps = detect_fvgs(&series, 20);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].direction, GapDirection::Bearish);
        assert!(gaps[0].gap_high > gaps[0].gap_low);
    }
}
