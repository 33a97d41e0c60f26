use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::error::{FatalError, RuntimeError};
use crate::types::{Direction, ErrorLog, ErrorSeverity, Heartbeat, Signal, Trade, TradeState};

/// Per-`(alias, direction)` MAE/MFE summary returned by `mae_mfe_stats` (§4.F).
#[derive(Debug, Clone, Copy, Default)]
pub struct MaeMfeRow {
    pub median_mae: Option<Decimal>,
    pub median_mfe: Option<Decimal>,
    pub mean_mae: Option<Decimal>,
    pub mean_mfe: Option<Decimal>,
    pub sample_count: usize,
}

/// Optional filters for `list_trades` (§4.F).
#[derive(Debug, Clone, Default)]
pub struct TradeFilter {
    pub alias: Option<String>,
    pub direction: Option<Direction>,
    pub state: Option<TradeState>,
}

/// Thin wrapper over a `PgPool`. Every operation is a single-statement
/// transaction: commits on success, rolls back on error (§4.F, §5).
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, FatalError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(FatalError::DatabaseUnreachable)?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), FatalError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(FatalError::Migration)
    }

    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    pub async fn insert_signal(&self, signal: &Signal) -> Result<(), RuntimeError> {
        sqlx::query(
            r#"
            INSERT INTO signals (
                id, alias, vendor_symbol, direction, generated_at_utc,
                entry_price, initial_sl, initial_tp, strategy_name, notes, estimated_rr
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(signal.id)
        .bind(&signal.alias)
        .bind(&signal.vendor_symbol)
        .bind(signal.direction.as_str())
        .bind(signal.generated_at_utc)
        .bind(signal.entry_price)
        .bind(signal.initial_sl)
        .bind(signal.initial_tp)
        .bind(&signal.strategy_name)
        .bind(&signal.notes)
        .bind(signal.estimated_rr)
        .execute(&self.pool)
        .await
        .map_err(RuntimeError::Database)?;

        Ok(())
    }

    pub async fn insert_trade(&self, trade: &Trade) -> Result<(), RuntimeError> {
        sqlx::query(
            r#"
            INSERT INTO trades (
                id, signal_id, alias, vendor_symbol, direction, planned_entry,
                actual_entry, stop_loss, take_profit, state, open_time_utc,
                close_time_utc, close_price, close_reason
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(trade.id)
        .bind(trade.signal_id)
        .bind(&trade.alias)
        .bind(&trade.vendor_symbol)
        .bind(trade.direction.as_str())
        .bind(trade.planned_entry)
        .bind(trade.actual_entry)
        .bind(trade.stop_loss)
        .bind(trade.take_profit)
        .bind(trade.state.as_str())
        .bind(trade.open_time_utc)
        .bind(trade.close_time_utc)
        .bind(trade.close_price)
        .bind(&trade.close_reason)
        .execute(&self.pool)
        .await
        .map_err(RuntimeError::Database)?;

        Ok(())
    }

    /// Applies a full snapshot of `trade`'s mutable fields (state, SL/TP, close
    /// fields). Errors with `UnknownTrade` when no row matches the id.
    pub async fn update_trade(&self, trade: &Trade) -> Result<(), RuntimeError> {
        let result = sqlx::query(
            r#"
            UPDATE trades
            SET stop_loss = $1, take_profit = $2, state = $3,
                close_time_utc = $4, close_price = $5, close_reason = $6
            WHERE id = $7
            "#,
        )
        .bind(trade.stop_loss)
        .bind(trade.take_profit)
        .bind(trade.state.as_str())
        .bind(trade.close_time_utc)
        .bind(trade.close_price)
        .bind(&trade.close_reason)
        .bind(trade.id)
        .execute(&self.pool)
        .await
        .map_err(RuntimeError::Database)?;

        if result.rows_affected() == 0 {
            return Err(RuntimeError::UnknownTrade(trade.id));
        }
        Ok(())
    }

    pub async fn list_open_trades(&self) -> Result<Vec<Trade>, RuntimeError> {
        let rows = sqlx::query("SELECT * FROM trades WHERE state = 'open' ORDER BY open_time_utc ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(RuntimeError::Database)?;
        rows.iter().map(row_to_trade).collect()
    }

    pub async fn list_trades(&self, filter: &TradeFilter) -> Result<Vec<Trade>, RuntimeError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM trades
            WHERE ($1::TEXT IS NULL OR alias = $1)
              AND ($2::TEXT IS NULL OR direction = $2)
              AND ($3::TEXT IS NULL OR state = $3)
            ORDER BY close_time_utc DESC NULLS FIRST
            "#,
        )
        .bind(filter.alias.as_deref())
        .bind(filter.direction.map(Direction::as_str))
        .bind(filter.state.map(TradeState::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(RuntimeError::Database)?;
        rows.iter().map(row_to_trade).collect()
    }

    pub async fn closed_trade_ids(&self) -> Result<Vec<Uuid>, RuntimeError> {
        let rows = sqlx::query("SELECT id FROM trades WHERE state != 'open'")
            .fetch_all(&self.pool)
            .await
            .map_err(RuntimeError::Database)?;
        Ok(rows.iter().map(|r| r.get::<Uuid, _>("id")).collect())
    }

    /// Median/mean MAE and MFE over the most recent 100 closed trades for
    /// `(alias, direction)`, approximated from close price (§4.C, §4.F, §9).
    pub async fn mae_mfe_stats(&self, alias: &str, direction: Direction) -> Result<MaeMfeRow, RuntimeError> {
        let rows = sqlx::query(
            r#"
            SELECT actual_entry, close_price, direction
            FROM trades
            WHERE alias = $1 AND direction = $2 AND state != 'open' AND close_price IS NOT NULL
            ORDER BY close_time_utc DESC
            LIMIT 100
            "#,
        )
        .bind(alias)
        .bind(direction.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(RuntimeError::Database)?;

        let mut mae = Vec::new();
        let mut mfe = Vec::new();
        for row in &rows {
            let entry: Decimal = row.get("actual_entry");
            let close: Decimal = row.get("close_price");
            let pnl = if direction.is_buy() { close - entry } else { entry - close };
            if pnl.is_sign_negative() {
                mae.push(-pnl);
            } else if pnl.is_sign_positive() {
                mfe.push(pnl);
            }
        }

        Ok(MaeMfeRow {
            median_mae: median(&mut mae),
            median_mfe: median(&mut mfe),
            mean_mae: mean(&mae),
            mean_mfe: mean(&mfe),
            sample_count: rows.len(),
        })
    }

    pub async fn insert_heartbeat(&self, heartbeat: &Heartbeat) -> Result<(), RuntimeError> {
        sqlx::query("INSERT INTO heartbeats (id, timestamp_utc, detail) VALUES ($1, $2, $3)")
            .bind(heartbeat.id)
            .bind(heartbeat.timestamp_utc)
            .bind(&heartbeat.detail)
            .execute(&self.pool)
            .await
            .map_err(RuntimeError::Database)?;
        Ok(())
    }

    pub async fn insert_error_log(&self, entry: &ErrorLog) -> Result<(), RuntimeError> {
        sqlx::query(
            "INSERT INTO error_logs (id, timestamp_utc, severity, component, message) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.id)
        .bind(entry.timestamp_utc)
        .bind(entry.severity.as_str())
        .bind(&entry.component)
        .bind(&entry.message)
        .execute(&self.pool)
        .await
        .map_err(RuntimeError::Database)?;
        Ok(())
    }

    pub async fn recent_heartbeats(&self, since: DateTime<Utc>) -> Result<Vec<Heartbeat>, RuntimeError> {
        let rows = sqlx::query(
            "SELECT id, timestamp_utc, detail FROM heartbeats WHERE timestamp_utc >= $1 ORDER BY timestamp_utc DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(RuntimeError::Database)?;

        Ok(rows
            .iter()
            .map(|r| Heartbeat {
                id: r.get("id"),
                timestamp_utc: r.get("timestamp_utc"),
                detail: r.get("detail"),
            })
            .collect())
    }

    pub async fn recent_error_logs(&self, since: DateTime<Utc>) -> Result<Vec<ErrorLog>, RuntimeError> {
        let rows = sqlx::query(
            "SELECT id, timestamp_utc, severity, component, message FROM error_logs WHERE timestamp_utc >= $1 ORDER BY timestamp_utc DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(RuntimeError::Database)?;

        rows.iter()
            .map(|r| {
                let severity_str: String = r.get("severity");
                Ok(ErrorLog {
                    id: r.get("id"),
                    timestamp_utc: r.get("timestamp_utc"),
                    severity: ErrorSeverity::from_str(&severity_str)
                        .map_err(RuntimeError::InvalidTransition)?,
                    component: r.get("component"),
                    message: r.get("message"),
                })
            })
            .collect()
    }
}

fn row_to_trade(row: &sqlx::postgres::PgRow) -> Result<Trade, RuntimeError> {
    let direction_str: String = row.get("direction");
    let state_str: String = row.get("state");
    Ok(Trade {
        id: row.get("id"),
        signal_id: row.get("signal_id"),
        alias: row.get("alias"),
        vendor_symbol: row.get("vendor_symbol"),
        direction: Direction::from_str(&direction_str).map_err(RuntimeError::InvalidTransition)?,
        planned_entry: row.get("planned_entry"),
        actual_entry: row.get("actual_entry"),
        stop_loss: row.get("stop_loss"),
        take_profit: row.get("take_profit"),
        state: TradeState::from_str(&state_str).map_err(RuntimeError::InvalidTransition)?,
        open_time_utc: row.get("open_time_utc"),
        close_time_utc: row.get("close_time_utc"),
        close_price: row.get("close_price"),
        close_reason: row.get("close_reason"),
    })
}

fn median(values: &mut [Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    values.sort();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / Decimal::from(2))
    } else {
        Some(values[mid])
    }
}

fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<Decimal>() / Decimal::from(values.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn median_of_even_count_averages_middle_two() {
        let mut values = vec![dec!(1), dec!(3), dec!(2), dec!(4)];
        assert_eq!(median(&mut values), Some(dec!(2.5)));
    }

    #[test]
    fn median_of_empty_is_none() {
        let mut values: Vec<Decimal> = Vec::new();
        assert_eq!(median(&mut values), None);
    }

    #[test]
    fn mean_divides_sum_by_count() {
        let values = vec![dec!(1), dec!(2), dec!(3)];
        assert_eq!(mean(&values), Some(dec!(2)));
    }
}
