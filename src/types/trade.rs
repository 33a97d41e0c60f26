use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::signal::Direction;

/// Lifecycle state of a trade. Transitions are exhaustively matched wherever a
/// trade's state is consumed so the compiler flags any missing case (§4.E, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeState {
    Open,
    ClosedByTp,
    ClosedBySl,
    ClosedManual,
    Expired,
}

impl TradeState {
    pub fn is_open(self) -> bool {
        matches!(self, TradeState::Open)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TradeState::Open => "open",
            TradeState::ClosedByTp => "closed_by_tp",
            TradeState::ClosedBySl => "closed_by_sl",
            TradeState::ClosedManual => "closed_manual",
            TradeState::Expired => "expired",
        }
    }
}

impl std::str::FromStr for TradeState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TradeState::Open),
            "closed_by_tp" => Ok(TradeState::ClosedByTp),
            "closed_by_sl" => Ok(TradeState::ClosedBySl),
            "closed_manual" => Ok(TradeState::ClosedManual),
            "expired" => Ok(TradeState::Expired),
            other => Err(format!("unknown trade state: {other}")),
        }
    }
}

impl std::fmt::Display for TradeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a trade left the `Open` state via the state machine's SL/TP detection.
/// Manual/expired closes are reported through `Notifier::update_alert` instead (§4.D, §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseType {
    Tp,
    Sl,
}

impl CloseType {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseType::Tp => "tp",
            CloseType::Sl => "sl",
        }
    }
}

/// Persisted trade record (§3). `signal_id` references exactly one `Signal`; a
/// unique constraint on `trades.signal_id` enforces the 1:1 invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub signal_id: Uuid,
    pub alias: String,
    pub vendor_symbol: String,
    pub direction: Direction,
    pub planned_entry: Decimal,
    pub actual_entry: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub state: TradeState,
    pub open_time_utc: DateTime<Utc>,
    pub close_time_utc: Option<DateTime<Utc>>,
    pub close_price: Option<Decimal>,
    pub close_reason: Option<String>,
}

impl Trade {
    pub fn new(
        signal_id: Uuid,
        alias: impl Into<String>,
        vendor_symbol: impl Into<String>,
        direction: Direction,
        planned_entry: Decimal,
        actual_entry: Decimal,
        stop_loss: Decimal,
        take_profit: Decimal,
        open_time_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            signal_id,
            alias: alias.into(),
            vendor_symbol: vendor_symbol.into(),
            direction,
            planned_entry,
            actual_entry,
            stop_loss,
            take_profit,
            state: TradeState::Open,
            open_time_utc,
            close_time_utc: None,
            close_price: None,
            close_reason: None,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.open_time_utc
    }
}
