use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::DataError;
use crate::types::{CandleSeries, Interval};

use super::provider::MarketDataProvider;

type CacheKey = (String, Interval);

/// Incremental per-`(symbol, interval)` OHLC store. Minimises upstream calls by
/// only fetching the gap since the last cached timestamp on subsequent calls
/// (§4.A). Each key is guarded independently so concurrent symbol workers never
/// contend on each other's slice.
pub struct CandleCache {
    provider: Arc<dyn MarketDataProvider>,
    series: RwLock<HashMap<CacheKey, CandleSeries>>,
    max_attempts: u32,
}

impl CandleCache {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            provider,
            series: RwLock::new(HashMap::new()),
            max_attempts: 3,
        }
    }

    /// Returns a series covering at least `lookback`, fetching only the gap since
    /// the last cached candle on repeat calls. Lookback is clamped to the
    /// interval's vendor maximum, with a warning on clamp (§4.A).
    pub async fn get_candles(
        &self,
        vendor_symbol: &str,
        interval: Interval,
        lookback: Duration,
    ) -> Result<CandleSeries, DataError> {
        let clamped = if lookback > interval.max_lookback() {
            warn!(
                symbol = vendor_symbol,
                interval = interval.code(),
                requested_days = lookback.num_days(),
                max_days = interval.max_lookback().num_days(),
                "lookback exceeds vendor maximum, clamping"
            );
            interval.max_lookback()
        } else {
            lookback
        };

        let now = Utc::now();
        let key: CacheKey = (vendor_symbol.to_string(), interval);

        let fetch_start = {
            let guard = self.series.read().await;
            match guard.get(&key).and_then(|s| s.last_timestamp()) {
                Some(last) => last,
                None => now - clamped,
            }
        };

        let fetched = self.fetch_with_backoff(vendor_symbol, interval, fetch_start, now).await?;

        let mut guard = self.series.write().await;
        let entry = guard.entry(key).or_insert_with(CandleSeries::new);
        entry.merge(fetched);

        if entry.is_empty() {
            return Err(DataError::Empty {
                symbol: vendor_symbol.to_string(),
                interval: interval.code().to_string(),
            });
        }

        Ok(entry.clone())
    }

    /// Attempts a minimal one-day fetch to confirm the vendor knows this symbol.
    pub async fn validate_symbol(&self, vendor_symbol: &str) -> bool {
        let now = Utc::now();
        let start = now - Duration::days(1);
        for attempt in 0..2 {
            match self.provider.fetch(vendor_symbol, Interval::H4, start, now).await {
                Ok(candles) if !candles.is_empty() => return true,
                Ok(_) => return false,
                Err(_) if attempt + 1 < 2 => {
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
                Err(_) => return false,
            }
        }
        false
    }

    /// Purges cache entries matching the given filters; `None` matches any value.
    pub async fn clear(&self, symbol: Option<&str>, interval: Option<Interval>) {
        let mut guard = self.series.write().await;
        guard.retain(|(s, i), _| {
            let symbol_matches = symbol.map(|sym| sym == s).unwrap_or(true);
            let interval_matches = interval.map(|iv| iv == *i).unwrap_or(true);
            !(symbol_matches && interval_matches)
        });
    }

    async fn fetch_with_backoff(
        &self,
        vendor_symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<crate::types::Candle>, DataError> {
        let mut last_err = None;
        for attempt in 0..self.max_attempts {
            match self.provider.fetch(vendor_symbol, interval, start, end).await {
                Ok(candles) => return Ok(candles),
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 < self.max_attempts {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap())
    }
}

/// `min(10, 2*2^n)` seconds, per §5.
fn backoff_delay(attempt: u32) -> std::time::Duration {
    let seconds = (2u64.saturating_mul(1u64 << attempt)).min(10);
    std::time::Duration::from_secs(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::provider::StaticProvider;
    use crate::types::Candle;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn candle(ts: i64) -> Candle {
        Candle {
            timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
            open: dec!(1),
            high: dec!(1),
            low: dec!(1),
            close: dec!(1),
            volume: dec!(1),
        }
    }

    #[tokio::test]
    async fn repeated_calls_return_monotone_non_decreasing_length() {
        let provider = Arc::new(
            StaticProvider::new().seed("AAA", Interval::H1, vec![candle(0), candle(3600), candle(7200)]),
        );
        let cache = CandleCache::new(provider);

        let first = cache.get_candles("AAA", Interval::H1, Duration::days(1)).await.unwrap();
        let second = cache.get_candles("AAA", Interval::H1, Duration::days(1)).await.unwrap();

        assert!(second.len() >= first.len());
        assert_eq!(first.as_slice()[0], second.as_slice()[0]);
    }

    #[tokio::test]
    async fn empty_fetch_surfaces_as_data_error() {
        let provider = Arc::new(StaticProvider::new());
        let cache = CandleCache::new(provider);
        let result = cache.get_candles("UNKNOWN", Interval::H1, Duration::days(1)).await;
        assert!(result.is_err());
    }
}
