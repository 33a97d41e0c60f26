use std::collections::HashMap;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use h4_scanner::config::AppConfig;
use h4_scanner::logging;
use h4_scanner::market_data::{CandleCache, HttpChartProvider};
use h4_scanner::notifications::{EmailNotifier, MultiNotifier, Notifier, TelegramNotifier};
use h4_scanner::orchestrator::{HeartbeatLoop, ScanOrchestrator, SummaryLoop};
use h4_scanner::persistence::Database;
use h4_scanner::state_machine::TradeStateMachine;
use h4_scanner::strategy::{H4Strategy, SlTpEstimator};

#[derive(Parser)]
#[command(name = "h4-scanner")]
#[command(author = "Scanner Bot")]
#[command(version = "0.1.0")]
#[command(about = "Multi-symbol, multi-timeframe price-action scanner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations and exit
    Migrate,
    /// Run the scan loop, heartbeat and summary timers, and the health endpoint
    Run {
        /// Health endpoint port
        #[arg(long, default_value = "8080")]
        health_port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let db = match Database::connect(&config.postgres.connection_url()).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!(error = %e, "failed to connect to database");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Migrate => {
            db.migrate().await?;
            info!("migrations applied");
            Ok(())
        }
        Commands::Run { health_port } => run(config, db, health_port).await,
    }
}

async fn run(config: AppConfig, db: Arc<Database>, health_port: u16) -> anyhow::Result<()> {
    db.migrate().await?;
    info!(symbols = config.symbols.len(), "starting scanner");

    let timezone = config.timezone()?;
    let telegram: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(
        config.telegram.bot_token.clone(),
        config.telegram.chat_id,
        timezone,
    ));
    let email: Arc<dyn Notifier> = Arc::new(EmailNotifier::new(
        &config.smtp.server,
        config.smtp.port,
        &config.smtp.user,
        &config.smtp.password,
        &config.smtp.from_email,
        &config.smtp.to_email,
        config.smtp.use_ssl,
        timezone,
    )?);
    let notifier: Arc<dyn Notifier> = Arc::new(MultiNotifier::new(vec![telegram, email]));

    let provider = Arc::new(HttpChartProvider::new("https://charts.internal"));
    let cache = CandleCache::new(provider);
    let estimator = SlTpEstimator::new(config.scanner.risk_percentage, config.scanner.default_equity);
    let strategy = H4Strategy::new(estimator);
    let state_machine = TradeStateMachine::new();

    let symbols: HashMap<String, String> = config.symbols.clone();
    let aliases: Vec<String> = symbols.keys().cloned().collect();

    let orchestrator = Arc::new(ScanOrchestrator::new(
        cache,
        strategy,
        state_machine,
        Arc::clone(&db),
        Arc::clone(&notifier),
        symbols,
        config.scanner.scan_parallelism,
    ));
    orchestrator.seed().await?;

    let heartbeat = Arc::new(HeartbeatLoop::new(Arc::clone(&db), Arc::clone(&notifier), aliases));
    let summary = Arc::new(SummaryLoop::new(Arc::clone(&db), Arc::clone(&notifier), chrono::Utc::now()));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let health_db = Arc::clone(&db);
    let health_task = tokio::spawn(async move {
        if let Err(e) = h4_scanner::health::serve(health_db, health_port).await {
            error!(error = %e, "health endpoint stopped");
        }
    });

    let scan_task = tokio::spawn(orchestrator.run(
        std::time::Duration::from_secs(config.scanner.scan_interval_seconds),
        shutdown_rx.clone(),
    ));
    let heartbeat_task = tokio::spawn(heartbeat.run(
        std::time::Duration::from_secs(config.scanner.heartbeat_interval_minutes * 60),
        shutdown_rx.clone(),
    ));
    let summary_task = tokio::spawn(summary.run(
        std::time::Duration::from_secs(config.scanner.email_summary_interval_hours * 3600),
        shutdown_rx.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = tokio::join!(scan_task, heartbeat_task, summary_task);
    health_task.abort();

    Ok(())
}
