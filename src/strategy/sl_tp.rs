use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::indicators::{atr_last, swing_lows, swing_highs};
use crate::types::{Direction, MultiTimeframeContext, Trade};

/// Per-`(alias, direction)` MAE/MFE summary over the most recent 100 closed
/// trades (§4.C, §4.F).
#[derive(Debug, Clone, Copy, Default)]
pub struct MaeMfeStats {
    pub median_mae: Option<Decimal>,
    pub median_mfe: Option<Decimal>,
    pub mean_mae: Option<Decimal>,
    pub mean_mfe: Option<Decimal>,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentKind {
    MoveSl,
    CloseEarly,
}

#[derive(Debug, Clone)]
pub struct Adjustment {
    pub kind: AdjustmentKind,
    pub new_sl: Option<Decimal>,
    pub reason: String,
}

impl Adjustment {
    fn move_sl(new_sl: Decimal, reason: impl Into<String>) -> Self {
        Self {
            kind: AdjustmentKind::MoveSl,
            new_sl: Some(new_sl),
            reason: reason.into(),
        }
    }

    fn close_early(reason: impl Into<String>) -> Self {
        Self {
            kind: AdjustmentKind::CloseEarly,
            new_sl: None,
            reason: reason.into(),
        }
    }
}

pub struct SlTpEstimator {
    pub atr_mult_sl: Decimal,
    pub atr_mult_tp: Decimal,
    pub risk_fraction: Decimal,
    pub default_equity: Decimal,
}

impl SlTpEstimator {
    pub fn new(risk_fraction: Decimal, default_equity: Decimal) -> Self {
        Self {
            atr_mult_sl: dec!(1.5),
            atr_mult_tp: dec!(2.5),
            risk_fraction,
            default_equity,
        }
    }

    /// Places SL/TP for a new signal from ATR, the nearest opposing swing point,
    /// and historical MAE/MFE when available (§4.C). Guarantees the buy/sell
    /// ordering invariant unconditionally.
    pub fn estimate_for_new_signal(
        &self,
        ctx: &MultiTimeframeContext,
        direction: Direction,
        entry: Decimal,
        stats: MaeMfeStats,
    ) -> (Decimal, Decimal) {
        let h4_atr = atr_last(&ctx.h4, 14).unwrap_or(Decimal::ZERO);
        let h1_atr = atr_last(&ctx.h1, 14).unwrap_or(Decimal::ZERO);
        let avg_atr = (h4_atr + h1_atr) / dec!(2);

        if direction.is_buy() {
            let lows = swing_lows(&ctx.h4, 2);
            let nearest_low = lows
                .into_iter()
                .filter(|s| *s < entry)
                .max()
                .unwrap_or(entry * dec!(0.98));
            let sl = nearest_low - avg_atr * self.atr_mult_sl;
            let tp = match stats.median_mfe {
                Some(mfe) => entry + mfe,
                None => entry + avg_atr * self.atr_mult_tp,
            };
            (sl, tp)
        } else {
            let highs = swing_highs(&ctx.h4, 2);
            let nearest_high = highs
                .into_iter()
                .filter(|s| *s > entry)
                .min()
                .unwrap_or(entry * dec!(1.02));
            let sl = nearest_high + avg_atr * self.atr_mult_sl;
            let tp = match stats.median_mfe {
                Some(mfe) => entry - mfe,
                None => entry - avg_atr * self.atr_mult_tp,
            };
            (sl, tp)
        }
    }

    /// Breakeven shift at >1R, ATR-trail at >2R, time-stop after 7 days open (§4.C).
    pub fn evaluate_adjustment(
        &self,
        trade: &Trade,
        current_price: Decimal,
        h4_atr: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Option<Adjustment> {
        let sl_distance = (trade.actual_entry - trade.stop_loss).abs();
        let profit_r = if sl_distance > Decimal::ZERO {
            (current_price - trade.actual_entry).abs() / sl_distance
        } else {
            Decimal::ZERO
        };

        let at_or_past_breakeven = if trade.direction.is_buy() {
            trade.stop_loss >= trade.actual_entry
        } else {
            trade.stop_loss <= trade.actual_entry
        };

        if profit_r > Decimal::ONE && !at_or_past_breakeven {
            return Some(Adjustment::move_sl(
                trade.actual_entry,
                "Move SL to breakeven (1R profit)",
            ));
        }

        if profit_r > dec!(2) {
            if let Some(atr) = h4_atr {
                let trail = if trade.direction.is_buy() {
                    current_price - atr
                } else {
                    current_price + atr
                };
                let improves = if trade.direction.is_buy() {
                    trail > trade.stop_loss
                } else {
                    trail < trade.stop_loss
                };
                if improves {
                    return Some(Adjustment::move_sl(trail, "ATR trail at 2R profit"));
                }
            }
        }

        if trade.age(now) > chrono::Duration::days(7) {
            return Some(Adjustment::close_early("Trade open > 7 days"));
        }

        None
    }

    /// `risk_amount = default_equity * risk_fraction`; lot size rounds to two
    /// decimals or defaults to `0.01` when the SL distance is zero (§4.C, §8).
    pub fn risk_and_lot(&self, entry: Decimal, sl: Decimal) -> (Decimal, Decimal) {
        let risk_amount = self.default_equity * self.risk_fraction;
        let sl_distance = (entry - sl).abs();
        let lot_size = if sl_distance > Decimal::ZERO {
            (risk_amount / sl_distance).round_dp(2)
        } else {
            dec!(0.01)
        };
        (risk_amount, lot_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candle, CandleSeries};
    use chrono::{TimeZone, Utc};

    fn flat_series(n: i64, price: Decimal) -> CandleSeries {
        let candles = (0..n)
            .map(|i| Candle {
                timestamp: Utc.timestamp_opt(i * 3600, 0).unwrap(),
                open: price,
                high: price + dec!(1),
                low: price - dec!(1),
                close: price,
                volume: dec!(1),
            })
            .collect();
        CandleSeries::from_sorted(candles)
    }

    fn ctx() -> MultiTimeframeContext {
        MultiTimeframeContext {
            alias: "TEST".into(),
            vendor_symbol: "TEST".into(),
            now_utc: Utc::now(),
            h4: flat_series(20, dec!(100)),
            h1: flat_series(20, dec!(100)),
            m30: CandleSeries::new(),
            m15: CandleSeries::new(),
            m5: CandleSeries::new(),
            m1: CandleSeries::new(),
        }
    }

    #[test]
    fn buy_invariant_holds_without_mfe_stats() {
        let estimator = SlTpEstimator::new(dec!(0.01), dec!(10000));
        let (sl, tp) = estimator.estimate_for_new_signal(&ctx(), Direction::Buy, dec!(100), MaeMfeStats::default());
        assert!(sl < dec!(100));
        assert!(dec!(100) < tp);
    }

    #[test]
    fn sell_invariant_holds_without_mfe_stats() {
        let estimator = SlTpEstimator::new(dec!(0.01), dec!(10000));
        let (sl, tp) = estimator.estimate_for_new_signal(&ctx(), Direction::Sell, dec!(100), MaeMfeStats::default());
        assert!(tp < dec!(100));
        assert!(dec!(100) < sl);
    }

    #[test]
    fn lot_size_defaults_when_sl_distance_is_zero() {
        let estimator = SlTpEstimator::new(dec!(0.01), dec!(10000));
        let (risk, lot) = estimator.risk_and_lot(dec!(100), dec!(100));
        assert_eq!(risk, dec!(100));
        assert_eq!(lot, dec!(0.01));
    }

    #[test]
    fn breakeven_shift_triggers_at_just_above_1r() {
        let estimator = SlTpEstimator::new(dec!(0.01), dec!(10000));
        let trade = Trade::new(
            uuid::Uuid::new_v4(),
            "TEST",
            "TEST",
            Direction::Buy,
            dec!(100),
            dec!(100),
            dec!(98),
            dec!(110),
            Utc::now(),
        );
        let adj = estimator
            .evaluate_adjustment(&trade, dec!(102.01), Some(dec!(1)), Utc::now())
            .expect("expected an adjustment");
        assert_eq!(adj.kind, AdjustmentKind::MoveSl);
        assert_eq!(adj.new_sl, Some(dec!(100)));
        assert_eq!(adj.reason, "Move SL to breakeven (1R profit)");
    }

    #[test]
    fn time_stop_after_seven_days() {
        let estimator = SlTpEstimator::new(dec!(0.01), dec!(10000));
        let mut trade = Trade::new(
            uuid::Uuid::new_v4(),
            "TEST",
            "TEST",
            Direction::Buy,
            dec!(100),
            dec!(100),
            dec!(98),
            dec!(110),
            Utc::now() - chrono::Duration::days(8),
        );
        trade.stop_loss = dec!(100); // already at breakeven so it falls through to the time-stop
        let adj = estimator
            .evaluate_adjustment(&trade, dec!(100.5), None, Utc::now())
            .expect("expected an adjustment");
        assert_eq!(adj.kind, AdjustmentKind::CloseEarly);
        assert_eq!(adj.reason, "Trade open > 7 days");
    }
}
