use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::info;

use crate::notifications::Notifier;
use crate::persistence::{Database, TradeFilter};
use crate::types::TradeState;

/// Periodic digest of everything persisted since the last run: trades closed and
/// errors logged in the window. Content is intentionally a thin read over
/// persisted state, not a new source of truth (§4.G, ambient scheduling concern).
pub struct SummaryLoop {
    db: Arc<Database>,
    notifier: Arc<dyn Notifier>,
    last_summary_at: Mutex<DateTime<Utc>>,
}

impl SummaryLoop {
    pub fn new(db: Arc<Database>, notifier: Arc<dyn Notifier>, started_at: DateTime<Utc>) -> Self {
        Self {
            db,
            notifier,
            last_summary_at: Mutex::new(started_at),
        }
    }

    pub async fn run(self: Arc<Self>, interval: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.send_summary().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn send_summary(&self) {
        info!("compiling summary");
        let period_end = Utc::now();
        let period_start = *self.last_summary_at.lock().expect("lock not poisoned");

        let closed = self.db.list_trades(&TradeFilter::default()).await.unwrap_or_default();
        let closed_in_window: Vec<_> = closed
            .into_iter()
            .filter(|t| !t.state.is_open() && t.close_time_utc.is_some_and(|ts| ts >= period_start && ts <= period_end))
            .collect();

        let errors = self.db.recent_error_logs(period_start).await.unwrap_or_default();
        let errors_in_window: Vec<_> = errors.into_iter().filter(|e| e.timestamp_utc <= period_end).collect();

        let tp_count = closed_in_window.iter().filter(|t| t.state == TradeState::ClosedByTp).count();
        let sl_count = closed_in_window.iter().filter(|t| t.state == TradeState::ClosedBySl).count();
        let other_count = closed_in_window.len() - tp_count - sl_count;

        let detail = format!(
            "Summary {} -> {}: {} closed (TP {}, SL {}, other {}), {} error(s) logged",
            period_start.format("%Y-%m-%d %H:%M"),
            period_end.format("%Y-%m-%d %H:%M"),
            closed_in_window.len(),
            tp_count,
            sl_count,
            other_count,
            errors_in_window.len(),
        );

        self.notifier.heartbeat(&detail, period_end).await;
        *self.last_summary_at.lock().expect("lock not poisoned") = period_end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_count_never_underflows_when_every_close_is_tp_or_sl() {
        let total = 5usize;
        let tp = 3usize;
        let sl = 2usize;
        assert_eq!(total - tp - sl, 0);
    }
}
