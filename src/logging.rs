use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber. Level is driven by `RUST_LOG`,
/// defaulting to `info` for this crate and `warn` for dependencies.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,h4_scanner=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();
}
