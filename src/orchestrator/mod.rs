pub mod heartbeat;
pub mod summary;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

pub use heartbeat::HeartbeatLoop;
pub use summary::SummaryLoop;

use crate::indicators::atr_last;
use crate::market_data::CandleCache;
use crate::notifications::Notifier;
use crate::persistence::{Database, TradeFilter};
use crate::state_machine::{Action, TradeStateMachine};
use crate::strategy::{H4Strategy, TradeUpdateAction};
use crate::types::{CloseType, Direction, ErrorLog, ErrorSeverity, Interval, MultiTimeframeContext, Trade, TradeState};

/// Per-interval lookback requested on every cycle, distinct from `Interval::max_lookback`'s
/// vendor ceiling: these are the windows the strategy actually needs to see (§4.A, §4.G).
fn lookback_for(interval: Interval) -> ChronoDuration {
    match interval {
        Interval::H4 => ChronoDuration::days(30),
        Interval::H1 => ChronoDuration::days(14),
        Interval::M30 => ChronoDuration::days(7),
        Interval::M15 => ChronoDuration::days(7),
        Interval::M5 => ChronoDuration::days(3),
        Interval::M1 => ChronoDuration::days(1),
    }
}

/// Ties the candle cache, strategy engine, state machine, persistence and notifier
/// together into the per-cycle pipeline (§4.G). Owns all of them for the lifetime
/// of the process; see §3 "Ownership".
pub struct ScanOrchestrator {
    cache: CandleCache,
    strategy: H4Strategy,
    state_machine: TradeStateMachine,
    db: Arc<Database>,
    notifier: Arc<dyn Notifier>,
    symbols: HashMap<String, String>,
    parallelism: usize,
}

impl ScanOrchestrator {
    pub fn new(
        cache: CandleCache,
        strategy: H4Strategy,
        state_machine: TradeStateMachine,
        db: Arc<Database>,
        notifier: Arc<dyn Notifier>,
        symbols: HashMap<String, String>,
        parallelism: usize,
    ) -> Self {
        Self {
            cache,
            strategy,
            state_machine,
            db,
            notifier,
            symbols,
            parallelism: parallelism.max(1),
        }
    }

    /// Loads every non-open trade id into the state machine's closed set so a
    /// process restart can never re-fire a notification for an already-closed trade.
    pub async fn seed(&self) -> anyhow::Result<()> {
        let ids = self.db.closed_trade_ids().await?;
        self.state_machine.seed_closed(ids).await;
        Ok(())
    }

    /// Drives the scan loop at `scan_interval` until `shutdown` reports `true`.
    /// An in-flight cycle always runs to completion before shutdown is observed (§5).
    pub async fn run(self: Arc<Self>, scan_interval: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(scan_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scan orchestrator shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One pass over every configured symbol, fanned out with bounded parallelism
    /// via a `JoinSet` gated by a `Semaphore` sized `min(#symbols, parallelism)` (§5, §9).
    pub async fn run_cycle(self: &Arc<Self>) {
        if self.symbols.is_empty() {
            return;
        }

        let permits = self.parallelism.min(self.symbols.len());
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks = JoinSet::new();

        for (alias, vendor_symbol) in self.symbols.clone() {
            let orchestrator = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                orchestrator.scan_symbol(&alias, &vendor_symbol).await;
            });
        }

        while tasks.join_next().await.is_some() {}
    }

    /// Fetches the six timeframes, evaluates a new signal, then walks every open
    /// trade for this symbol through the close/adjustment pipeline. A failure here
    /// never affects another symbol's pass (§4.G, §9).
    async fn scan_symbol(&self, alias: &str, vendor_symbol: &str) {
        let ctx = match self.build_context(alias, vendor_symbol).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(alias, error = %e, "skipping symbol for this cycle, data unavailable");
                self.record_error(ErrorSeverity::Warning, alias, &e.to_string()).await;
                return;
            }
        };

        let stats = self.combined_mae_mfe_stats(alias).await;
        if let Some(signal) = self.strategy.evaluate_new_signal(&ctx, stats).await {
            self.open_trade_for_signal(&ctx, signal).await;
        }

        let open_trades = match self
            .db
            .list_trades(&TradeFilter {
                alias: Some(alias.to_string()),
                direction: None,
                state: Some(TradeState::Open),
            })
            .await
        {
            Ok(trades) => trades,
            Err(e) => {
                self.record_runtime_error(alias, e).await;
                return;
            }
        };

        if open_trades.is_empty() {
            return;
        }

        let (candle_high, candle_low) = ctx
            .h1
            .last()
            .map(|c| (c.high, c.low))
            .unwrap_or_else(|| (ctx.current_price(), ctx.current_price()));
        let h4_atr = atr_last(&ctx.h4, 14);
        let current_price = ctx.current_price();

        for trade in open_trades {
            self.process_open_trade(trade, candle_high, candle_low, current_price, h4_atr, ctx.now_utc).await;
        }
    }

    async fn build_context(&self, alias: &str, vendor_symbol: &str) -> anyhow::Result<MultiTimeframeContext> {
        let h4 = self.cache.get_candles(vendor_symbol, Interval::H4, lookback_for(Interval::H4)).await?;
        let h1 = self.cache.get_candles(vendor_symbol, Interval::H1, lookback_for(Interval::H1)).await?;
        let m30 = self.cache.get_candles(vendor_symbol, Interval::M30, lookback_for(Interval::M30)).await?;
        let m15 = self.cache.get_candles(vendor_symbol, Interval::M15, lookback_for(Interval::M15)).await?;
        let m5 = self.cache.get_candles(vendor_symbol, Interval::M5, lookback_for(Interval::M5)).await?;
        let m1 = self.cache.get_candles(vendor_symbol, Interval::M1, lookback_for(Interval::M1)).await?;

        Ok(MultiTimeframeContext {
            alias: alias.to_string(),
            vendor_symbol: vendor_symbol.to_string(),
            now_utc: Utc::now(),
            h4,
            h1,
            m30,
            m15,
            m5,
            m1,
        })
    }

    /// `evaluate_new_signal` needs one `MaeMfeStats` before the strategy has resolved
    /// a direction internally, so both directions' history is fetched and the one
    /// with more samples wins (buy on a tie); an approximation noted alongside the
    /// MAE/MFE aggregate itself (§4.C, §9).
    async fn combined_mae_mfe_stats(&self, alias: &str) -> crate::strategy::MaeMfeStats {
        let buy = self.db.mae_mfe_stats(alias, Direction::Buy).await.unwrap_or_default();
        let sell = self.db.mae_mfe_stats(alias, Direction::Sell).await.unwrap_or_default();
        let row = if sell.sample_count > buy.sample_count { sell } else { buy };

        crate::strategy::MaeMfeStats {
            median_mae: row.median_mae,
            median_mfe: row.median_mfe,
            mean_mae: row.mean_mae,
            mean_mfe: row.mean_mfe,
            sample_count: row.sample_count,
        }
    }

    async fn open_trade_for_signal(&self, ctx: &MultiTimeframeContext, signal: crate::types::Signal) {
        if let Err(e) = self.db.insert_signal(&signal).await {
            self.record_runtime_error(&ctx.alias, e).await;
            return;
        }

        let trade = Trade::new(
            signal.id,
            signal.alias.clone(),
            signal.vendor_symbol.clone(),
            signal.direction,
            signal.entry_price,
            signal.entry_price,
            signal.initial_sl,
            signal.initial_tp,
            ctx.now_utc,
        );

        if let Err(e) = self.db.insert_trade(&trade).await {
            self.record_runtime_error(&ctx.alias, e).await;
            return;
        }

        self.notifier
            .signal_alert(
                &signal.alias,
                signal.direction,
                signal.entry_price,
                signal.initial_sl,
                signal.initial_tp,
                signal.estimated_rr,
                ctx.now_utc,
            )
            .await;
    }

    /// Close detection runs through the state machine first, which owns the
    /// duplicate-suppressing closed-id set; only when a trade is still open does
    /// the strategy's adjustment fallback (breakeven/trail/time-stop) get a turn (§4.D, §4.E, §4.G).
    async fn process_open_trade(
        &self,
        trade: Trade,
        candle_high: Decimal,
        candle_low: Decimal,
        current_price: Decimal,
        h4_atr: Option<Decimal>,
        now: chrono::DateTime<Utc>,
    ) {
        if let Some(action) = self.state_machine.check_and_update(&trade, candle_high, candle_low).await {
            self.apply_close_action(trade, action, now).await;
            return;
        }

        let Some(update) = self.strategy.evaluate_open_trade(&trade, candle_high, candle_low, current_price, h4_atr, now) else {
            return;
        };

        match update.action {
            TradeUpdateAction::UpdateSlTp => {
                let mut updated = trade;
                if let Some(sl) = update.new_sl {
                    updated.stop_loss = sl;
                }
                if let Some(tp) = update.new_tp {
                    updated.take_profit = tp;
                }
                if let Err(e) = self.db.update_trade(&updated).await {
                    self.record_runtime_error(&updated.alias, e).await;
                    return;
                }
                self.notifier.update_alert(&updated.alias, update.new_sl, update.new_tp, &update.reason, now).await;
            }
            TradeUpdateAction::CloseManual => {
                let alias = trade.alias.clone();
                match self
                    .state_machine
                    .apply_manual(trade, TradeState::ClosedManual, current_price, update.reason.clone(), now)
                    .await
                {
                    Ok(updated) => {
                        if let Err(e) = self.db.update_trade(&updated).await {
                            self.record_runtime_error(&alias, e).await;
                            return;
                        }
                        self.notifier.update_alert(&alias, None, None, &update.reason, now).await;
                    }
                    Err(e) => self.record_runtime_error(&alias, e).await,
                }
            }
            // Already ruled out above: `check_and_update` returning `None` means
            // neither SL nor TP was crossed by this candle.
            TradeUpdateAction::CloseBySl | TradeUpdateAction::CloseByTp => {}
        }
    }

    async fn apply_close_action(&self, trade: Trade, action: Action, now: chrono::DateTime<Utc>) {
        let close_type = match action {
            Action::CloseByTp { .. } => CloseType::Tp,
            Action::CloseBySl { .. } => CloseType::Sl,
        };
        let should_notify = close_type == CloseType::Sl
            || self.state_machine.should_send_tp_notification(trade.id, TradeState::ClosedByTp).await;
        let alias = trade.alias.clone();

        match self.state_machine.apply(trade, action, now).await {
            Ok(updated) => {
                let close_price = updated.close_price.unwrap_or_default();
                if let Err(e) = self.db.update_trade(&updated).await {
                    self.record_runtime_error(&alias, e).await;
                    return;
                }
                if should_notify {
                    self.notifier.close_alert(&alias, close_type, close_price, now).await;
                }
            }
            Err(e) => self.record_runtime_error(&alias, e).await,
        }
    }

    async fn record_runtime_error(&self, alias: &str, error: crate::error::RuntimeError) {
        error!(alias, error = %error, "runtime error during scan cycle");
        self.record_error(ErrorSeverity::Error, alias, &error.to_string()).await;
    }

    /// Data-level failures (`ErrorSeverity::Warning`) are recorded without an
    /// alert — they recur every cycle until the upstream vendor recovers and
    /// would otherwise spam the configured transports (§7).
    async fn record_error(&self, severity: ErrorSeverity, component: &str, message: &str) {
        let entry = ErrorLog::new(severity, component, message);
        if let Err(e) = self.db.insert_error_log(&entry).await {
            error!(component, error = %e, "failed to persist error log");
        }
        if severity != ErrorSeverity::Warning {
            self.notifier.error_alert(component, message, entry.timestamp_utc).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookback_windows_match_the_per_interval_history_the_strategy_needs() {
        assert_eq!(lookback_for(Interval::H4), ChronoDuration::days(30));
        assert_eq!(lookback_for(Interval::H1), ChronoDuration::days(14));
        assert_eq!(lookback_for(Interval::M30), ChronoDuration::days(7));
        assert_eq!(lookback_for(Interval::M15), ChronoDuration::days(7));
        assert_eq!(lookback_for(Interval::M5), ChronoDuration::days(3));
        assert_eq!(lookback_for(Interval::M1), ChronoDuration::days(1));
    }
}
