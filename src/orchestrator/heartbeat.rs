use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tracing::info;

use crate::notifications::Notifier;
use crate::persistence::{Database, TradeFilter};
use crate::types::{ErrorSeverity, Heartbeat, TradeState};

/// Periodic per-symbol liveness record: open-trade count plus the most recent
/// error, persisted and notified on its own timer (§4.G, ambient scheduling concern).
pub struct HeartbeatLoop {
    db: Arc<Database>,
    notifier: Arc<dyn Notifier>,
    aliases: Vec<String>,
    last_scan_times: RwLock<HashMap<String, chrono::DateTime<Utc>>>,
}

impl HeartbeatLoop {
    pub fn new(db: Arc<Database>, notifier: Arc<dyn Notifier>, aliases: Vec<String>) -> Self {
        Self {
            db,
            notifier,
            aliases,
            last_scan_times: RwLock::new(HashMap::new()),
        }
    }

    pub async fn run(self: Arc<Self>, interval: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.send_heartbeats().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn send_heartbeats(&self) {
        info!("sending heartbeats");
        let since = Utc::now() - chrono::Duration::hours(1);

        for alias in &self.aliases {
            let open_count = self
                .db
                .list_trades(&TradeFilter {
                    alias: Some(alias.clone()),
                    direction: None,
                    state: Some(TradeState::Open),
                })
                .await
                .map(|trades| trades.len())
                .unwrap_or(0);

            let last_error = self
                .db
                .recent_error_logs(since)
                .await
                .unwrap_or_default()
                .into_iter()
                .filter(|e| e.component == *alias && e.severity != ErrorSeverity::Warning)
                .map(|e| e.message)
                .next();

            let detail = match &last_error {
                Some(message) => format!("{alias}: {open_count} open trade(s), last error: {message}"),
                None => format!("{alias}: {open_count} open trade(s)"),
            };

            let heartbeat = Heartbeat::new(detail.clone());
            if let Err(e) = self.db.insert_heartbeat(&heartbeat).await {
                tracing::warn!(alias, error = %e, "failed to persist heartbeat");
            }
            self.notifier.heartbeat(&detail, heartbeat.timestamp_utc).await;

            self.last_scan_times.write().await.insert(alias.clone(), heartbeat.timestamp_utc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_includes_open_trade_count_without_an_error() {
        let detail = format!("{}: {} open trade(s)", "AAA", 3);
        assert_eq!(detail, "AAA: 3 open trade(s)");
    }
}
