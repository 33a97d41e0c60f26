pub mod email;
pub mod telegram;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;

use crate::types::{CloseType, Direction};

pub use email::EmailNotifier;
pub use telegram::TelegramNotifier;

/// Shared contract for outbound alerts. Every timestamp is formatted in the
/// configured timezone by the implementor (§6).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn signal_alert(
        &self,
        alias: &str,
        direction: Direction,
        entry: Decimal,
        sl: Decimal,
        tp: Decimal,
        estimated_rr: Decimal,
        at: DateTime<Utc>,
    );

    async fn update_alert(&self, alias: &str, new_sl: Option<Decimal>, new_tp: Option<Decimal>, reason: &str, at: DateTime<Utc>);

    async fn close_alert(&self, alias: &str, close_type: CloseType, close_price: Decimal, at: DateTime<Utc>);

    async fn heartbeat(&self, detail: &str, at: DateTime<Utc>);

    async fn error_alert(&self, component: &str, message: &str, at: DateTime<Utc>);
}

/// Fan-out wrapper the orchestrator holds as `Arc<dyn Notifier>`; a failure in
/// one transport never blocks the others (§6, §7 — notification failures are
/// caught and logged at the call site, never propagated).
pub struct MultiNotifier {
    transports: Vec<std::sync::Arc<dyn Notifier>>,
}

impl MultiNotifier {
    pub fn new(transports: Vec<std::sync::Arc<dyn Notifier>>) -> Self {
        Self { transports }
    }
}

#[async_trait]
impl Notifier for MultiNotifier {
    async fn signal_alert(
        &self,
        alias: &str,
        direction: Direction,
        entry: Decimal,
        sl: Decimal,
        tp: Decimal,
        estimated_rr: Decimal,
        at: DateTime<Utc>,
    ) {
        for transport in &self.transports {
            transport.signal_alert(alias, direction, entry, sl, tp, estimated_rr, at).await;
        }
    }

    async fn update_alert(&self, alias: &str, new_sl: Option<Decimal>, new_tp: Option<Decimal>, reason: &str, at: DateTime<Utc>) {
        for transport in &self.transports {
            transport.update_alert(alias, new_sl, new_tp, reason, at).await;
        }
    }

    async fn close_alert(&self, alias: &str, close_type: CloseType, close_price: Decimal, at: DateTime<Utc>) {
        for transport in &self.transports {
            transport.close_alert(alias, close_type, close_price, at).await;
        }
    }

    async fn heartbeat(&self, detail: &str, at: DateTime<Utc>) {
        for transport in &self.transports {
            transport.heartbeat(detail, at).await;
        }
    }

    async fn error_alert(&self, component: &str, message: &str, at: DateTime<Utc>) {
        for transport in &self.transports {
            transport.error_alert(component, message, at).await;
        }
    }
}

pub(crate) fn format_timestamp(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_timestamp_uses_the_configured_zone() {
        let at = DateTime::parse_from_rfc3339("2026-01-01T12:00:00Z").unwrap().with_timezone(&Utc);
        let formatted = format_timestamp(at, chrono_tz::Africa::Johannesburg);
        assert!(formatted.contains("2026-01-01"));
        assert!(formatted.contains("14:00:00"));
    }
}
