use crate::types::CandleSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Bullish,
    Bearish,
}

/// Break of Structure: over the last `lookback` candles, record `recent_high` and
/// `recent_low`; the latest candle breaking either strictly is a BOS (§4.B).
pub fn detect_bos(series: &CandleSeries, lookback: usize) -> Option<Bias> {
    let all = series.as_slice();
    if all.len() < 2 {
        return None;
    }
    let window = &all[all.len().saturating_sub(lookback)..];
    let (history, latest) = window.split_at(window.len() - 1);
    if history.is_empty() {
        return None;
    }
    let latest = &latest[0];

    let recent_high = history.iter().map(|c| c.high).max().unwrap();
    let recent_low = history.iter().map(|c| c.low).min().unwrap();

    if latest.high > recent_high {
        Some(Bias::Bullish)
    } else if latest.low < recent_low {
        Some(Bias::Bearish)
    } else {
        None
    }
}

/// Change of Character: compares up/down body counts over `lookback` candles
/// against the same counts over the last 5. A bearish CHOCH requires a
/// historically up-dominant market (`U > 1.5*D`) flipping down-dominant in the
/// last 5 (`d > u`); bullish is the mirror (§4.B).
pub fn detect_choch(series: &CandleSeries, lookback: usize) -> Option<Bias> {
    let all = series.as_slice();
    let window = &all[all.len().saturating_sub(lookback)..];
    if window.len() < 5 {
        return None;
    }

    let (up, down) = count_bodies(window);
    let last5 = &window[window.len() - 5..];
    let (u, d) = count_bodies(last5);

    let up = up as f64;
    let down = down as f64;

    if up > 1.5 * down && d > u {
        Some(Bias::Bearish)
    } else if down > 1.5 * up && u > d {
        Some(Bias::Bullish)
    } else {
        None
    }
}

fn count_bodies(candles: &[crate::types::Candle]) -> (usize, usize) {
    let up = candles.iter().filter(|c| c.is_bullish()).count();
    let down = candles.iter().filter(|c| c.is_bearish()).count();
    (up, down)
}

/// Liquidity sweep: over the last 3 candles, a bullish sweep pierces the prior
/// `lookback`-candle low and reverses into an up-close; bearish is the mirror (§4.B).
pub fn detect_liquidity_sweep(series: &CandleSeries, lookback: usize) -> Option<Bias> {
    let all = series.as_slice();
    if all.len() < 4 {
        return None;
    }
    let window = &all[all.len().saturating_sub(lookback)..];
    if window.len() < 4 {
        return None;
    }
    let last3 = &window[window.len() - 3..];
    let history = &window[..window.len() - 3];

    let recent_low = history.iter().map(|c| c.low).min().unwrap();
    let recent_high = history.iter().map(|c| c.high).max().unwrap();

    if last3[0].low < recent_low && last3[2].close > last3[0].open {
        Some(Bias::Bullish)
    } else if last3[0].high > recent_high && last3[2].close < last3[0].open {
        Some(Bias::Bearish)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candle;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use rust_decimal::Decimal;

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
    fn bos_detects_new_high_break() {
        let series = CandleSeries::from_sorted(vec![
            candle(0, dec!(100), dec!(105), dec!(99), dec!(101)),
            candle(60, dec!(101), dec!(104), dec!(100), dec!(102)),
            candle(120, dec!(102), dec!(110), dec!(101), dec!(109)),
        ]);
        assert_eq!(detect_bos(&series, 20), Some(Bias::Bullish));
    }

    #[test]
    fn sweep_detects_bullish_reversal_wick() {
        let series = CandleSeries::from_sorted(vec![
            candle(0, dec!(100), dec!(102), dec!(99), dec!(101)),
            candle(60, dec!(101), dec!(102), dec!(100), dec!(101.5)),
            candle(120, dec!(101.5), dec!(102), dec!(95), dec!(101)), // pierces prior low
            candle(180, dec!(101), dec!(103), dec!(100.5), dec!(102.5)), // closes above last open
            candle(240, dec!(102.5), dec!(104), dec!(102), dec!(103.5)),
        ]);
        assert_eq!(detect_liquidity_sweep(&series, 20), Some(Bias::Bullish));
    }
}
