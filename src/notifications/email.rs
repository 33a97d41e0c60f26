use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use rust_decimal::Decimal;
use tracing::warn;

use crate::types::{CloseType, Direction};

use super::{format_timestamp, Notifier};

/// Sends plain-text alerts over SMTP via `lettre`'s async Tokio transport (§6).
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    to: String,
    timezone: Tz,
}

impl EmailNotifier {
    pub fn new(
        server: &str,
        port: u16,
        user: &str,
        password: &str,
        from: impl Into<String>,
        to: impl Into<String>,
        use_ssl: bool,
        timezone: Tz,
    ) -> Result<Self, lettre::transport::smtp::Error> {
        let credentials = Credentials::new(user.to_string(), password.to_string());
        let builder = if use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)?
        };
        let transport = builder.port(port).credentials(credentials).build();

        Ok(Self {
            transport,
            from: from.into(),
            to: to.into(),
            timezone,
        })
    }

    async fn send(&self, subject: &str, body: String) {
        let message = match Message::builder()
            .from(self.from.parse().expect("configured from-address is valid"))
            .to(self.to.parse().expect("configured to-address is valid"))
            .subject(subject)
            .body(body)
        {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "failed to build email notification");
                return;
            }
        };

        if let Err(e) = self.transport.send(message).await {
            warn!(error = %e, "failed to deliver email notification");
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
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
        let body = format!(
            "Alias: {alias}\nDirection: {direction}\nEntry: {entry}\nSL: {sl}\nTP: {tp}\nRR: {estimated_rr}\nAt: {}",
            format_timestamp(at, self.timezone)
        );
        self.send(&format!("Signal: {alias}"), body).await;
    }

    async fn update_alert(&self, alias: &str, new_sl: Option<Decimal>, new_tp: Option<Decimal>, reason: &str, at: DateTime<Utc>) {
        let body = format!(
            "Alias: {alias}\nNew SL: {}\nNew TP: {}\nReason: {reason}\nAt: {}",
            new_sl.map(|v| v.to_string()).unwrap_or_else(|| "unchanged".to_string()),
            new_tp.map(|v| v.to_string()).unwrap_or_else(|| "unchanged".to_string()),
            format_timestamp(at, self.timezone)
        );
        self.send(&format!("Update: {alias}"), body).await;
    }

    async fn close_alert(&self, alias: &str, close_type: CloseType, close_price: Decimal, at: DateTime<Utc>) {
        let body = format!(
            "Alias: {alias}\nClose type: {}\nPrice: {close_price}\nAt: {}",
            close_type.as_str(),
            format_timestamp(at, self.timezone)
        );
        self.send(&format!("Closed: {alias}"), body).await;
    }

    async fn heartbeat(&self, detail: &str, at: DateTime<Utc>) {
        let body = format!("{detail}\nAt: {}", format_timestamp(at, self.timezone));
        self.send("Heartbeat", body).await;
    }

    async fn error_alert(&self, component: &str, message: &str, at: DateTime<Utc>) {
        let body = format!("Component: {component}\nMessage: {message}\nAt: {}", format_timestamp(at, self.timezone));
        self.send(&format!("Error in {component}"), body).await;
    }
}
