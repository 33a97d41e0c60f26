use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single OHLC observation. The last candle of a freshly-fetched series may be
/// unfinished until its interval elapses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> Decimal {
        self.high - self.close.max(self.open)
    }

    pub fn lower_wick(&self) -> Decimal {
        self.close.min(self.open) - self.low
    }
}

/// Ordered sequence of candles for one `(symbol, interval)` key. No two entries
/// share a timestamp and appending never reorders existing entries (§3).
#[derive(Debug, Clone, Default)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new() -> Self {
        Self { candles: Vec::new() }
    }

    pub fn from_sorted(candles: Vec<Candle>) -> Self {
        let mut series = Self { candles };
        series.candles.sort_by_key(|c| c.timestamp);
        series
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn last_n(&self, n: usize) -> &[Candle] {
        let len = self.candles.len();
        if n >= len {
            &self.candles[..]
        } else {
            &self.candles[len - n..]
        }
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last().map(|c| c.timestamp)
    }

    pub fn closes(&self) -> Vec<Decimal> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<Decimal> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<Decimal> {
        self.candles.iter().map(|c| c.low).collect()
    }

    /// Merges a batch of newly-fetched candles into the series. Duplicate timestamps
    /// are resolved by keeping the newly-arrived value (allows the in-progress candle
    /// to be updated in place); the result stays sorted ascending by timestamp (§4.A).
    pub fn merge(&mut self, incoming: impl IntoIterator<Item = Candle>) {
        for candle in incoming {
            match self
                .candles
                .binary_search_by_key(&candle.timestamp, |c| c.timestamp)
            {
                Ok(idx) => self.candles[idx] = candle,
                Err(idx) => self.candles.insert(idx, candle),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn candle(ts: i64, close: Decimal) -> Candle {
        Candle {
            timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
        }
    }

    #[test]
    fn merge_deduplicates_and_sorts() {
        let mut series = CandleSeries::new();
        series.merge([candle(100, dec!(1)), candle(200, dec!(2))]);
        series.merge([candle(200, dec!(2.5)), candle(300, dec!(3))]);

        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![dec!(1), dec!(2.5), dec!(3)]);
        let timestamps: Vec<_> = series.as_slice().iter().map(|c| c.timestamp.timestamp()).collect();
        assert_eq!(timestamps, vec![100, 200, 300]);
    }

    #[test]
    fn merge_keeps_prefix_stable() {
        let mut series = CandleSeries::new();
        series.merge([candle(100, dec!(1)), candle(200, dec!(2))]);
        let prefix_before = series.as_slice()[0];
        series.merge([candle(200, dec!(2.1)), candle(300, dec!(3))]);
        assert_eq!(series.as_slice()[0], prefix_before);
    }
}
