use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn is_buy(self) -> bool {
        matches!(self, Direction::Buy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Direction::Buy),
            "sell" => Ok(Direction::Sell),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record of a generated trading signal (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub alias: String,
    pub vendor_symbol: String,
    pub direction: Direction,
    pub generated_at_utc: DateTime<Utc>,
    pub entry_price: Decimal,
    pub initial_sl: Decimal,
    pub initial_tp: Decimal,
    pub strategy_name: String,
    pub notes: String,
    pub estimated_rr: Decimal,
}

impl Signal {
    pub const STRATEGY_NAME: &'static str = "H4 FVG / OB + structure";

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        alias: impl Into<String>,
        vendor_symbol: impl Into<String>,
        direction: Direction,
        generated_at_utc: DateTime<Utc>,
        entry_price: Decimal,
        initial_sl: Decimal,
        initial_tp: Decimal,
        notes: impl Into<String>,
        estimated_rr: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alias: alias.into(),
            vendor_symbol: vendor_symbol.into(),
            direction,
            generated_at_utc,
            entry_price,
            initial_sl,
            initial_tp,
            strategy_name: Self::STRATEGY_NAME.to_string(),
            notes: notes.into(),
            estimated_rr,
        }
    }
}
