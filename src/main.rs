use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trendguard::application::trading_loop::{LoopExit, TradingEngine};
use trendguard::config::TradingConfig;
use trendguard::infrastructure::exchange_client_factory::ExchangeClientFactory;

#[derive(Parser, Debug)]
#[command(name = "trendguard", version, about = "Trend-following futures trading bot")]
struct Args {
    /// Symbol to trade, overrides TRADING_SYMBOL
    #[arg(long)]
    symbol: Option<String>,
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trendguard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = TradingConfig::from_env();
    if let Some(symbol) = args.symbol.as_deref() {
        config = config.with_symbol(symbol);
    }
    config.validate()?;

    let gateway = ExchangeClientFactory::create(&config)?;
    let mut engine = TradingEngine::initialize(gateway, config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    info!("Trading loop started. Press Ctrl+C to stop.");
    match engine.run(shutdown_rx).await? {
        LoopExit::Shutdown => info!("Stopped; open positions keep their exchange-side brackets"),
        LoopExit::Halted => error!("Stopped by global drawdown limit"),
    }

    Ok(())
}
