use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::RuntimeError;
use crate::types::{CloseType, Trade, TradeState};

/// An instruction produced by `check_and_update`; never mutates the trade directly (§4.E).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    CloseByTp { close_price: Decimal },
    CloseBySl { close_price: Decimal },
}

/// Tracks which trades have already left `Open` so a late candle crossing an old
/// TP/SL can never re-fire a notification (§4.E, §8 scenario 5). Reload the closed
/// set from persistence at startup with `seed_closed`.
pub struct TradeStateMachine {
    closed: RwLock<HashSet<Uuid>>,
}

impl TradeStateMachine {
    pub fn new() -> Self {
        Self {
            closed: RwLock::new(HashSet::new()),
        }
    }

    pub async fn seed_closed(&self, ids: impl IntoIterator<Item = Uuid>) {
        let mut guard = self.closed.write().await;
        guard.extend(ids);
    }

    /// No effect once a trade has left `Open`; otherwise detects an SL or TP
    /// crossing from the observed candle extremes, SL checked first (§4.D tie-break).
    pub async fn check_and_update(
        &self,
        trade: &Trade,
        candle_high: Decimal,
        candle_low: Decimal,
    ) -> Option<Action> {
        if !trade.state.is_open() || self.closed.read().await.contains(&trade.id) {
            return None;
        }

        let sl_hit = if trade.direction.is_buy() {
            candle_low <= trade.stop_loss
        } else {
            candle_high >= trade.stop_loss
        };
        if sl_hit {
            return Some(Action::CloseBySl {
                close_price: trade.stop_loss,
            });
        }

        let tp_hit = if trade.direction.is_buy() {
            candle_high >= trade.take_profit
        } else {
            candle_low <= trade.take_profit
        };
        if tp_hit {
            return Some(Action::CloseByTp {
                close_price: trade.take_profit,
            });
        }

        None
    }

    /// Applies a close action to an in-memory trade snapshot, recording it in the
    /// closed set so it can never re-close. Callers persist the result separately.
    pub async fn apply(
        &self,
        mut trade: Trade,
        action: Action,
        now: DateTime<Utc>,
    ) -> Result<Trade, RuntimeError> {
        if !trade.state.is_open() {
            return Err(RuntimeError::InvalidTransition(format!(
                "trade {} is already {}",
                trade.id, trade.state
            )));
        }

        let (state, close_price, reason) = match action {
            Action::CloseByTp { close_price } => {
                (TradeState::ClosedByTp, close_price, CloseType::Tp.as_str())
            }
            Action::CloseBySl { close_price } => {
                (TradeState::ClosedBySl, close_price, CloseType::Sl.as_str())
            }
        };

        trade.state = state;
        trade.close_time_utc = Some(now);
        trade.close_price = Some(close_price);
        trade.close_reason = Some(reason.to_string());

        self.closed.write().await.insert(trade.id);
        Ok(trade)
    }

    /// Closes a trade outside the SL/TP path (estimator-driven early close or
    /// externally scheduled expiry).
    pub async fn apply_manual(
        &self,
        mut trade: Trade,
        target_state: TradeState,
        close_price: Decimal,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Trade, RuntimeError> {
        if !trade.state.is_open() {
            return Err(RuntimeError::InvalidTransition(format!(
                "trade {} is already {}",
                trade.id, trade.state
            )));
        }
        if target_state.is_open() {
            return Err(RuntimeError::InvalidTransition(
                "cannot transition a trade back into Open".to_string(),
            ));
        }

        trade.state = target_state;
        trade.close_time_utc = Some(now);
        trade.close_price = Some(close_price);
        trade.close_reason = Some(reason.into());

        self.closed.write().await.insert(trade.id);
        Ok(trade)
    }

    pub async fn is_closed(&self, trade_id: Uuid) -> bool {
        self.closed.read().await.contains(&trade_id)
    }

    /// A TP notification may fire only for the single `Open -> ClosedByTp`
    /// transition; once `trade_id` is in the closed set, no further TP
    /// notification is ever owed to it (§4.E, §8 scenario 5).
    pub async fn should_send_tp_notification(&self, trade_id: Uuid, new_state: TradeState) -> bool {
        new_state == TradeState::ClosedByTp && !self.closed.read().await.contains(&trade_id)
    }
}

impl Default for TradeStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use rust_decimal_macros::dec;

    fn open_trade(direction: Direction, entry: Decimal, sl: Decimal, tp: Decimal) -> Trade {
        Trade::new(Uuid::new_v4(), "TEST", "TEST", direction, entry, entry, sl, tp, Utc::now())
    }

    #[tokio::test]
    async fn sl_hit_takes_precedence_over_tp_in_same_candle() {
        let machine = TradeStateMachine::new();
        let trade = open_trade(Direction::Buy, dec!(100), dec!(99), dec!(101));
        let action = machine
            .check_and_update(&trade, dec!(102), dec!(98))
            .await
            .expect("expected an action");
        assert_eq!(action, Action::CloseBySl { close_price: dec!(99) });
    }

    #[tokio::test]
    async fn closed_trade_never_fires_a_second_notification() {
        let machine = TradeStateMachine::new();
        let trade = open_trade(Direction::Sell, dec!(100), dec!(102), dec!(95));
        let closed = machine
            .apply_manual(trade.clone(), TradeState::ClosedManual, dec!(99), "manual close", Utc::now())
            .await
            .unwrap();

        assert!(machine.is_closed(closed.id).await);

        let late_action = machine.check_and_update(&closed, dec!(101), dec!(94)).await;
        assert!(late_action.is_none());
        assert!(!machine.should_send_tp_notification(closed.id, TradeState::ClosedByTp).await);
    }

    #[tokio::test]
    async fn apply_on_already_closed_trade_is_invalid_transition() {
        let machine = TradeStateMachine::new();
        let mut trade = open_trade(Direction::Buy, dec!(100), dec!(99), dec!(101));
        trade.state = TradeState::ClosedByTp;
        let result = machine.apply(trade, Action::CloseByTp { close_price: dec!(101) }, Utc::now()).await;
        assert!(matches!(result, Err(RuntimeError::InvalidTransition(_))));
    }
}
