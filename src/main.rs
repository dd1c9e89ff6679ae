use anyhow::{Context, Result};
use clap::Parser;
use crossbot::api::{BinanceClient, MarketDataSource, ReplayFeed};
use crossbot::config::BotConfig;
use crossbot::execution::{OrderGateway, PaperGateway};
use crossbot::TradingBot;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "crossbot")]
#[command(about = "SMA crossover trading bot (paper execution)", long_about = None)]
struct Cli {
    /// Extra TOML/JSON/YAML config file, layered over crossbot.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Trading pair (e.g., BTC/USDT)
    #[arg(short, long)]
    symbol: Option<String>,

    /// Kline interval (1m, 5m, 1h, ...)
    #[arg(short, long)]
    interval: Option<String>,

    #[arg(long)]
    fast_window: Option<usize>,

    #[arg(long)]
    slow_window: Option<usize>,

    /// Quote currency spent per buy
    #[arg(long)]
    budget: Option<f64>,

    /// Spend this fraction of the free quote balance per buy (0 < pct <= 1)
    #[arg(long)]
    trade_pct: Option<f64>,

    /// Seconds between cycles
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Replay closes from a file instead of polling the exchange
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Seed previous averages from history on the first cycle
    #[arg(long)]
    warm_start: bool,

    /// Read market data from mainnet instead of the spot testnet
    #[arg(long)]
    mainnet: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    setup_logging(cli.log_json);

    let config = load_config(&cli).context("Failed to load configuration")?;

    tracing::info!(
        symbol = %config.symbol,
        interval = %config.interval,
        fast_window = config.fast_window,
        slow_window = config.slow_window,
        trade_budget = config.trade_budget,
        trade_pct = ?config.trade_pct,
        poll_interval_seconds = config.poll_interval_seconds,
        warm_start = config.warm_start,
        testnet = config.testnet,
        "Crossbot starting"
    );

    let market: Arc<dyn MarketDataSource> = match &cli.replay {
        Some(path) => Arc::new(
            ReplayFeed::from_file(path)
                .with_context(|| format!("Failed to load replay file {}", path.display()))?
                .with_warmup(config.history_limit()),
        ),
        None => Arc::new(
            BinanceClient::new(config.testnet, config.request_timeout())
                .context("Failed to create Binance client")?,
        ),
    };
    let gateway: Arc<dyn OrderGateway> = Arc::new(PaperGateway::new(&config.paper));

    let mut bot = TradingBot::from_config(&config, market, gateway)
        .context("Failed to build trading bot")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, finishing current cycle");
            shutdown_tx.send(true).ok();
        }
    });

    let summary = bot.run(shutdown_rx).await.context("Trading loop aborted")?;

    tracing::info!(
        cycles = summary.cycles,
        orders = summary.orders,
        failures = summary.failures,
        total_pnl = bot.tracker().total_pnl(),
        "Crossbot stopped"
    );

    Ok(())
}

fn setup_logging(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crossbot=info"));

    if json {
        fmt().json().with_env_filter(env_filter).init();
    } else {
        fmt().with_env_filter(env_filter).init();
    }
}

/// File and env layers first, then any flags given on the command line
fn load_config(cli: &Cli) -> crossbot::Result<BotConfig> {
    let mut builder = BotConfig::builder(cli.config.as_deref())
        .set_override_option("symbol", cli.symbol.clone())?
        .set_override_option("interval", cli.interval.clone())?
        .set_override_option("fast_window", cli.fast_window.map(|v| v as i64))?
        .set_override_option("slow_window", cli.slow_window.map(|v| v as i64))?
        .set_override_option("trade_budget", cli.budget)?
        .set_override_option("trade_pct", cli.trade_pct)?
        .set_override_option("poll_interval_seconds", cli.poll_interval.map(|v| v as i64))?;

    if cli.warm_start {
        builder = builder.set_override("warm_start", true)?;
    }
    if cli.mainnet {
        builder = builder.set_override("testnet", false)?;
    }

    BotConfig::from_builder(builder)
}
