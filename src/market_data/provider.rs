use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DataError;
use crate::types::{Candle, Interval};

/// Market-data vendor contract. The cache depends on this alone (§6); the wire
/// format of any specific vendor stays behind this seam.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch(
        &self,
        vendor_symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError>;
}

/// Minimal REST client over a JSON chart endpoint returning
/// `{"candles": [{"timestamp": i64, "open": ..., "high": ..., "low": ..., "close": ..., "volume": ...}]}`.
pub struct HttpChartProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChartProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(serde::Deserialize)]
struct ChartResponse {
    candles: Vec<ChartCandle>,
}

#[derive(serde::Deserialize)]
struct ChartCandle {
    timestamp: i64,
    open: rust_decimal::Decimal,
    high: rust_decimal::Decimal,
    low: rust_decimal::Decimal,
    close: rust_decimal::Decimal,
    volume: rust_decimal::Decimal,
}

#[async_trait]
impl MarketDataProvider for HttpChartProvider {
    async fn fetch(
        &self,
        vendor_symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        let url = format!(
            "{}/chart?symbol={}&interval={}&start={}&end={}",
            self.base_url,
            vendor_symbol,
            interval.code(),
            start.timestamp(),
            end.timestamp()
        );

        let response = self.client.get(&url).send().await.map_err(|e| DataError::Fetch {
            symbol: vendor_symbol.to_string(),
            interval: interval.code().to_string(),
            source: e.into(),
        })?;

        let parsed: ChartResponse = response.json().await.map_err(|e| DataError::Fetch {
            symbol: vendor_symbol.to_string(),
            interval: interval.code().to_string(),
            source: e.into(),
        })?;

        if parsed.candles.is_empty() {
            return Err(DataError::Empty {
                symbol: vendor_symbol.to_string(),
                interval: interval.code().to_string(),
            });
        }

        Ok(parsed
            .candles
            .into_iter()
            .filter_map(|c| {
                Some(Candle {
                    timestamp: DateTime::from_timestamp(c.timestamp, 0)?,
                    open: c.open,
                    high: c.high,
                    low: c.low,
                    close: c.close,
                    volume: c.volume,
                })
            })
            .collect())
    }
}

/// In-memory provider for tests: returns whatever was seeded for a given
/// `(vendor_symbol, interval)` key, ignoring the requested window.
#[derive(Default)]
pub struct StaticProvider {
    data: std::collections::HashMap<(String, Interval), Vec<Candle>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(mut self, vendor_symbol: impl Into<String>, interval: Interval, candles: Vec<Candle>) -> Self {
        self.data.insert((vendor_symbol.into(), interval), candles);
        self
    }
}

#[async_trait]
impl MarketDataProvider for StaticProvider {
    async fn fetch(
        &self,
        vendor_symbol: &str,
        interval: Interval,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        self.data
            .get(&(vendor_symbol.to_string(), interval))
            .cloned()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| DataError::Empty {
                symbol: vendor_symbol.to_string(),
                interval: interval.code().to_string(),
            })
    }
}
