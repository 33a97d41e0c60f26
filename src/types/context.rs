use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::candle::CandleSeries;

/// Ephemeral per-cycle bundle of all six timeframes for one symbol, plus the current
/// price used as the reference for SL/TP and adjustment math. Lives for one scan cycle.
pub struct MultiTimeframeContext {
    pub alias: String,
    pub vendor_symbol: String,
    pub now_utc: DateTime<Utc>,
    pub h4: CandleSeries,
    pub h1: CandleSeries,
    pub m30: CandleSeries,
    pub m15: CandleSeries,
    pub m5: CandleSeries,
    pub m1: CandleSeries,
}

impl MultiTimeframeContext {
    /// Last H1 close if present, else zero (§3).
    pub fn current_price(&self) -> Decimal {
        self.h1.last().map(|c| c.close).unwrap_or(Decimal::ZERO)
    }
}
