use rust_decimal::Decimal;

use crate::types::CandleSeries;

/// Average True Range as an exponential moving average of true range with
/// smoothing span `period`. The first true range uses only `high - low` since
/// there is no prior close (§4.B). Returns one ATR value per input candle,
/// empty if `series` is empty.
pub fn atr_series(series: &CandleSeries, period: usize) -> Vec<Decimal> {
    let candles = series.as_slice();
    if candles.is_empty() || period == 0 {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(candles.len());
    let mut prev_close: Option<Decimal> = None;
    let mut atr: Option<Decimal> = None;
    let period_dec = Decimal::from(period as u64);

    for candle in candles {
        let hl = candle.high - candle.low;
        let tr = match prev_close {
            Some(pc) => hl.max((candle.high - pc).abs()).max((candle.low - pc).abs()),
            None => hl,
        };

        atr = Some(match atr {
            None => tr,
            Some(prev_atr) => (prev_atr * (period_dec - Decimal::ONE) + tr) / period_dec,
        });

        out.push(atr.unwrap());
        prev_close = Some(candle.close);
    }

    out
}

/// Last ATR value for `series`, or `None` if the series is empty.
pub fn atr_last(series: &CandleSeries, period: usize) -> Option<Decimal> {
    atr_series(series, period).last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::types::Candle;
    use rust_decimal_macros::dec;

    fn series_of(values: &[(Decimal, Decimal, Decimal)]) -> CandleSeries {
        let candles = values
            .iter()
            .enumerate()
            .map(|(i, &(high, low, close))| Candle {
                timestamp: Utc.timestamp_opt(i as i64 * 60, 0).unwrap(),
                open: close,
                high,
                low,
                close,
                volume: dec!(1),
            })
            .collect();
        CandleSeries::from_sorted(candles)
    }

    #[test]
    fn atr_is_non_negative_for_positive_range_inputs() {
        let series = series_of(&[
            (dec!(10), dec!(8), dec!(9)),
            (dec!(11), dec!(9), dec!(10)),
            (dec!(12), dec!(9.5), dec!(11)),
        ]);
        let values = atr_series(&series, 14);
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|v| *v >= Decimal::ZERO));
    }

    #[test]
    fn empty_series_yields_no_atr() {
        let series = CandleSeries::new();
        assert!(atr_series(&series, 14).is_empty());
        assert!(atr_last(&series, 14).is_none());
    }

    #[test]
    fn first_true_range_uses_high_low_only() {
        let series = series_of(&[(dec!(10), dec!(8), dec!(9))]);
        let values = atr_series(&series, 14);
        assert_eq!(values[0], dec!(2));
    }
}
