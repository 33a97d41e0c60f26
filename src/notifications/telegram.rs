use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use teloxide::prelude::*;
use tracing::warn;

use crate::types::{CloseType, Direction};

use super::{format_timestamp, Notifier};

/// Sends plain-text alerts to a single Telegram chat via the Bot API (§6).
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
    timezone: Tz,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: i64, timezone: Tz) -> Self {
        Self {
            bot: Bot::new(bot_token.into()),
            chat_id: ChatId(chat_id),
            timezone,
        }
    }

    async fn send(&self, text: String) {
        if let Err(e) = self.bot.send_message(self.chat_id, text).await {
            warn!(error = %e, "failed to deliver Telegram notification");
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
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
        let text = format!(
            "Signal: {alias} {direction}\nEntry: {entry}\nSL: {sl}\nTP: {tp}\nRR: {estimated_rr}\nAt: {}",
            format_timestamp(at, self.timezone)
        );
        self.send(text).await;
    }

    async fn update_alert(&self, alias: &str, new_sl: Option<Decimal>, new_tp: Option<Decimal>, reason: &str, at: DateTime<Utc>) {
        let text = format!(
            "Update: {alias}\nNew SL: {}\nNew TP: {}\nReason: {reason}\nAt: {}",
            new_sl.map(|v| v.to_string()).unwrap_or_else(|| "unchanged".to_string()),
            new_tp.map(|v| v.to_string()).unwrap_or_else(|| "unchanged".to_string()),
            format_timestamp(at, self.timezone)
        );
        self.send(text).await;
    }

    async fn close_alert(&self, alias: &str, close_type: CloseType, close_price: Decimal, at: DateTime<Utc>) {
        let text = format!(
            "Closed: {alias} ({})\nPrice: {close_price}\nAt: {}",
            close_type.as_str(),
            format_timestamp(at, self.timezone)
        );
        self.send(text).await;
    }

    async fn heartbeat(&self, detail: &str, at: DateTime<Utc>) {
        let text = format!("Heartbeat: {detail}\nAt: {}", format_timestamp(at, self.timezone));
        self.send(text).await;
    }

    async fn error_alert(&self, component: &str, message: &str, at: DateTime<Utc>) {
        let text = format!(
            "Error in {component}: {message}\nAt: {}",
            format_timestamp(at, self.timezone)
        );
        self.send(text).await;
    }
}
