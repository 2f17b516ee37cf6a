//! Signal pipeline bot - process entry point

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use signal_core::EngineConfig;
use signal_engine::executor::TradeExecutorPool;
use signal_engine::market_data_cache::MarketDataCache;
use signal_engine::orchestrator::TradingBot;
use signal_engine::positions::PositionManager;
use signal_engine::queue::PrioritySignalQueue;
use signal_engine::risk::RiskValidator;
use signal_engine::workers::SignalWorkerPool;
use signal_networking::api_manager::ApiRequestManager;
use signal_networking::http_client::HttpExchangeClient;
use signal_networking::rate_governor::RateGovernor;
use signal_persistence::Ledger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "signal-bot", about = "Automated futures signal-to-execution pipeline")]
struct Cli {
    /// REST origin of the exchange, e.g. https://fapi.example.com
    #[arg(long, env = "EXCHANGE_REST_URL")]
    rest_url: String,

    /// WebSocket origin of the exchange's ticker stream, e.g. wss://fstream.example.com
    #[arg(long, env = "EXCHANGE_WS_URL")]
    ws_url: String,

    /// Path to the sqlite trade ledger. Defaults under the platform data dir.
    #[arg(long, env = "LEDGER_PATH")]
    ledger_path: Option<PathBuf>,

    /// Candle interval passed to getKlines (e.g. 15m, 1h).
    #[arg(long, env = "KLINE_INTERVAL", default_value = "15m")]
    kline_interval: String,

    /// Evaluate signals and log decisions without placing real orders.
    #[arg(long, env = "DRY_RUN", default_value_t = false)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signal_engine=info,signal_networking=info,signal_bot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    tracing::info!("starting signal pipeline bot (dry_run={})", cli.dry_run);

    let cfg = EngineConfig::from_env();

    let ledger_path = cli.ledger_path.unwrap_or_else(default_ledger_path);
    if let Some(parent) = ledger_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("could not create ledger directory {}: {}", parent.display(), e);
        }
    }

    let ledger = match Ledger::connect(&ledger_path).await {
        Ok(ledger) => Arc::new(ledger),
        Err(e) => {
            eprintln!("FATAL: failed to open trade ledger at {}: {}", ledger_path.display(), e);
            std::process::exit(1);
        }
    };

    let exchange: Arc<dyn signal_networking::exchange::ExchangeClient> =
        Arc::new(HttpExchangeClient::new(cli.rest_url.clone()));

    let governor = Arc::new(RateGovernor::default_governor());
    let api = Arc::new(ApiRequestManager::new(exchange.clone(), governor.clone()));

    let market_data = MarketDataCache::new(api.clone(), cli.ws_url.clone(), cfg.market_data_cache.clone());

    let workers = SignalWorkerPool::new(
        cfg.signal_workers.clone(),
        cfg.indicators.clone(),
        cli.kline_interval.clone(),
        market_data.clone(),
        api.clone(),
    );

    let queue = Arc::new(PrioritySignalQueue::new(cfg.signal_queue.clone()));
    let risk = Arc::new(RiskValidator::new(cfg.risk.clone()));
    let positions = PositionManager::new(
        cfg.position_manager.clone(),
        exchange.clone(),
        api.clone(),
        governor.clone(),
        ledger.clone(),
        cli.dry_run,
    );

    let executors = TradeExecutorPool::new(
        cfg.trade_executors.clone(),
        api.clone(),
        exchange.clone(),
        ledger.clone(),
        positions.clone(),
        cfg.stop_loss_percent,
        cfg.take_profit_percent,
        cli.dry_run,
    );

    if let Err(e) = positions
        .load_on_start(cfg.stop_loss_percent, cfg.take_profit_percent)
        .await
    {
        tracing::warn!("failed to reconstruct positions on start: {}", e);
    }

    let bot = TradingBot::new(cfg, market_data, workers, queue, risk, executors, positions);
    bot.start().await;

    tracing::info!("signal pipeline running, press ctrl-c to stop");
    let _ = tokio::signal::ctrl_c().await;

    tracing::info!("shutdown signal received");
    bot.stop();
}

fn default_ledger_path() -> PathBuf {
    dirs_next::data_local_dir()
        .map(|p| p.join("SignalPipeline").join("ledger.db"))
        .unwrap_or_else(|| PathBuf::from("signal-pipeline-ledger.db"))
}
