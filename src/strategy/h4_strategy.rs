use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::indicators::{
    detect_bos, detect_choch, detect_fvgs, detect_liquidity_sweep, detect_order_blocks, Bias,
};
use crate::types::{Direction, MultiTimeframeContext, Signal, Trade};

use super::sl_tp::{Adjustment, AdjustmentKind, MaeMfeStats, SlTpEstimator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeUpdateAction {
    CloseBySl,
    CloseByTp,
    CloseManual,
    UpdateSlTp,
}

#[derive(Debug, Clone)]
pub struct TradeUpdate {
    pub action: TradeUpdateAction,
    pub new_sl: Option<Decimal>,
    pub new_tp: Option<Decimal>,
    pub reason: String,
}

/// H4-bias / H1-M30-M15-structure / M5-entry strategy engine (§4.D).
pub struct H4Strategy {
    estimator: SlTpEstimator,
    last_h4_ts: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl H4Strategy {
    pub fn new(estimator: SlTpEstimator) -> Self {
        Self {
            estimator,
            last_h4_ts: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluates whether a new H4 close produces a tradeable signal. Returns
    /// `None` whenever any stage fails to confirm (§4.D).
    pub async fn evaluate_new_signal(
        &self,
        ctx: &MultiTimeframeContext,
        stats: MaeMfeStats,
    ) -> Option<Signal> {
        let latest_h4_ts = ctx.h4.last_timestamp()?;

        {
            let mut gate = self.last_h4_ts.lock().await;
            let advanced = match gate.get(&ctx.alias) {
                Some(prev) => latest_h4_ts > *prev,
                None => true,
            };
            gate.insert(ctx.alias.clone(), latest_h4_ts);
            if !advanced {
                return None;
            }
        }

        let bias = self.detect_bias(ctx)?;
        self.confirm_structure(ctx, bias)?;
        self.confirm_entry(ctx, bias)?;

        let direction = match bias {
            Bias::Bullish => Direction::Buy,
            Bias::Bearish => Direction::Sell,
        };
        let entry = ctx.current_price();
        let (sl, tp) = self.estimator.estimate_for_new_signal(ctx, direction, entry, stats);
        let sl_distance = (entry - sl).abs();
        let estimated_rr = if sl_distance > Decimal::ZERO {
            (tp - entry).abs() / sl_distance
        } else {
            Decimal::ZERO
        };

        Some(Signal::new(
            ctx.alias.clone(),
            ctx.vendor_symbol.clone(),
            direction,
            ctx.now_utc,
            entry,
            sl,
            tp,
            "H4 bias confirmed by H1/M15 structure and M5 entry",
            estimated_rr,
        ))
    }

    /// Last 20 H4 FVGs and OBs; bias from the direction counts of the last 3 of each (§4.D).
    fn detect_bias(&self, ctx: &MultiTimeframeContext) -> Option<Bias> {
        let fvgs = detect_fvgs(&ctx.h4, 20);
        let obs = detect_order_blocks(&ctx.h4, 20, Decimal::new(2, 2));

        let recent_fvgs = fvgs.iter().rev().take(3);
        let recent_obs = obs.iter().rev().take(3);

        let mut bullish = 0u32;
        let mut bearish = 0u32;
        for fvg in recent_fvgs {
            match fvg.direction {
                crate::indicators::GapDirection::Bullish => bullish += 1,
                crate::indicators::GapDirection::Bearish => bearish += 1,
            }
        }
        for ob in recent_obs {
            match ob.direction {
                crate::indicators::GapDirection::Bullish => bullish += 1,
                crate::indicators::GapDirection::Bearish => bearish += 1,
            }
        }

        if bullish > 2 * bearish && bullish > 0 {
            Some(Bias::Bullish)
        } else if bearish > 2 * bullish && bearish > 0 {
            Some(Bias::Bearish)
        } else {
            None
        }
    }

    /// H1 BOS/CHOCH and M15 sweeps must agree with the bias (§4.D).
    fn confirm_structure(&self, ctx: &MultiTimeframeContext, bias: Bias) -> Option<()> {
        let h1_bos = detect_bos(&ctx.h1, 20);
        let h1_choch = detect_choch(&ctx.h1, 20);
        let m15_sweep = detect_liquidity_sweep(&ctx.m15, 20);

        let confirmed = [h1_bos, h1_choch, m15_sweep]
            .into_iter()
            .any(|signal| signal == Some(bias));

        confirmed.then_some(())
    }

    /// M5 wick-rejection matching the bias over the last 3 candles, falling back
    /// to the 5-candle close trend (§4.D).
    fn confirm_entry(&self, ctx: &MultiTimeframeContext, bias: Bias) -> Option<()> {
        let m5 = ctx.m5.last_n(3);
        if m5.is_empty() {
            return None;
        }

        for candle in m5 {
            let body = candle.body();
            match bias {
                Bias::Bullish => {
                    if candle.lower_wick() > body * Decimal::from(2) && candle.is_bullish() {
                        return Some(());
                    }
                }
                Bias::Bearish => {
                    if candle.upper_wick() > body * Decimal::from(2) && candle.is_bearish() {
                        return Some(());
                    }
                }
            }
        }

        let m5_trend = ctx.m5.last_n(5);
        if m5_trend.len() < 5 {
            return None;
        }
        let last_close = m5_trend.last()?.close;
        let fifth_ago_close = m5_trend.first()?.close;
        let trend_aligned = match bias {
            Bias::Bullish => last_close > fifth_ago_close,
            Bias::Bearish => last_close <= fifth_ago_close,
        };
        trend_aligned.then_some(())
    }

    /// SL-first tie-break, then TP, then delegate to the estimator's adjustment
    /// rules (§4.D).
    pub fn evaluate_open_trade(
        &self,
        trade: &Trade,
        candle_high: Decimal,
        candle_low: Decimal,
        current_price: Decimal,
        h4_atr: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Option<TradeUpdate> {
        let sl_hit = if trade.direction.is_buy() {
            candle_low <= trade.stop_loss
        } else {
            candle_high >= trade.stop_loss
        };
        if sl_hit {
            return Some(TradeUpdate {
                action: TradeUpdateAction::CloseBySl,
                new_sl: None,
                new_tp: None,
                reason: "Stop loss hit".to_string(),
            });
        }

        let tp_hit = if trade.direction.is_buy() {
            candle_high >= trade.take_profit
        } else {
            candle_low <= trade.take_profit
        };
        if tp_hit {
            return Some(TradeUpdate {
                action: TradeUpdateAction::CloseByTp,
                new_sl: None,
                new_tp: None,
                reason: "Take profit hit".to_string(),
            });
        }

        let adjustment = self.estimator.evaluate_adjustment(trade, current_price, h4_atr, now)?;
        Some(translate_adjustment(adjustment))
    }
}

fn translate_adjustment(adjustment: Adjustment) -> TradeUpdate {
    match adjustment.kind {
        AdjustmentKind::MoveSl => TradeUpdate {
            action: TradeUpdateAction::UpdateSlTp,
            new_sl: adjustment.new_sl,
            new_tp: None,
            reason: adjustment.reason,
        },
        AdjustmentKind::CloseEarly => TradeUpdate {
            action: TradeUpdateAction::CloseManual,
            new_sl: None,
            new_tp: None,
            reason: adjustment.reason,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candle, CandleSeries};
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

    fn trade_with(direction: Direction, entry: Decimal, sl: Decimal, tp: Decimal) -> Trade {
        Trade::new(
            uuid::Uuid::new_v4(),
            "TEST",
            "TEST",
            direction,
            entry,
            entry,
            sl,
            tp,
            Utc::now(),
        )
    }

    fn strategy() -> H4Strategy {
        H4Strategy::new(SlTpEstimator::new(dec!(0.01), dec!(10000)))
    }

    #[test]
    fn sl_takes_precedence_over_tp_within_same_candle() {
        let trade = trade_with(Direction::Buy, dec!(100), dec!(99), dec!(101));
        let update = strategy()
            .evaluate_open_trade(&trade, dec!(102), dec!(98), dec!(100), None, Utc::now())
            .expect("expected an action");
        assert_eq!(update.action, TradeUpdateAction::CloseBySl);
    }

    #[test]
    fn sell_tp_hit_reports_close_by_tp() {
        let trade = trade_with(Direction::Sell, dec!(100), dec!(102), dec!(95));
        let update = strategy()
            .evaluate_open_trade(&trade, dec!(99), dec!(94), dec!(95), None, Utc::now())
            .expect("expected an action");
        assert_eq!(update.action, TradeUpdateAction::CloseByTp);
    }

    #[tokio::test]
    async fn no_new_h4_close_returns_no_signal_on_second_call() {
        let h4 = CandleSeries::from_sorted(vec![candle(0, dec!(100), dec!(101), dec!(99), dec!(100))]);
        let ctx = MultiTimeframeContext {
            alias: "AAA".into(),
            vendor_symbol: "AAA".into(),
            now_utc: Utc::now(),
            h4,
            h1: CandleSeries::new(),
            m30: CandleSeries::new(),
            m15: CandleSeries::new(),
            m5: CandleSeries::new(),
            m1: CandleSeries::new(),
        };
        let strat = strategy();
        let first = strat.evaluate_new_signal(&ctx, MaeMfeStats::default()).await;
        let second = strat.evaluate_new_signal(&ctx, MaeMfeStats::default()).await;
        assert!(first.is_none()); // no bias achievable with a single candle either way
        assert!(second.is_none());
    }
}
