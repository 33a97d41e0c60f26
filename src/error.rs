use thiserror::Error;

/// Startup-blocking errors: invalid configuration, unreachable database, failed migrations.
/// Logged at `error!`, an `error_alert` is dispatched, and the process exits non-zero.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database unreachable: {0}")]
    DatabaseUnreachable(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Mid-flight errors that do not take the symbol or process down: transient database
/// failures, state-machine inconsistencies, notification send failures. Logged at
/// `error!`, recorded in `error_logs`, an `error_alert` is dispatched, processing continues.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("unknown trade id: {0}")]
    UnknownTrade(uuid::Uuid),
    #[error("unsupported state transition: {0}")]
    InvalidTransition(String),
    #[error("notification delivery failed: {0}")]
    Notification(String),
}

/// Upstream data problems scoped to a single symbol: fetch failure, insufficient candles.
/// Logged at `warn!`, recorded in `error_logs` without alert spam, the symbol is skipped
/// and other symbols are unaffected.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("fetch failed for {symbol} {interval}: {source}")]
    Fetch {
        symbol: String,
        interval: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("insufficient candles for {symbol} {interval}: have {have}, need {need}")]
    InsufficientCandles {
        symbol: String,
        interval: String,
        have: usize,
        need: usize,
    },
    #[error("empty response for {symbol} {interval}")]
    Empty { symbol: String, interval: String },
}
