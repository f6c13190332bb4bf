// Trade Cost Simulator - CLI
// Streams order-book snapshots and logs live transaction-cost estimates

use std::path::Path;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use trade_cost_sim::{
    Config, ConfigError, CostModelEngine, FeeTier, OrderBookFeed, OrderType, SimResult,
    SimulationOrchestrator, SimulationParameters,
};

#[derive(Parser)]
#[command(name = "cost-sim")]
#[command(version = "0.2.0")]
#[command(about = "Real-time transaction cost estimator", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Connect to the feed and stream cost estimates
    Run {
        /// Order size in quote currency (USD)
        #[arg(long)]
        quantity: Option<Decimal>,

        /// Volatility input, percent
        #[arg(long)]
        volatility: Option<Decimal>,

        /// Fee tier (tier1, tier2, tier3)
        #[arg(long)]
        fee_tier: Option<String>,

        /// Order type (market or limit)
        #[arg(long)]
        order_type: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> SimResult<()> {
    match cli.command {
        Commands::Init { force } => init_config(&cli.config, force),
        Commands::Run {
            quantity,
            volatility,
            fee_tier,
            order_type,
        } => run_simulation(&cli.config, quantity, volatility, fee_tier, order_type).await,
    }
}

fn init_config(path: &str, force: bool) -> SimResult<()> {
    if Path::new(path).exists() && !force {
        return Err(ConfigError::Validation(format!(
            "{} already exists, pass --force to overwrite",
            path
        ))
        .into());
    }

    Config::default().to_file(path)?;
    info!("✅ Wrote default configuration to {}", path);
    Ok(())
}

async fn run_simulation(
    config_path: &str,
    quantity: Option<Decimal>,
    volatility: Option<Decimal>,
    fee_tier: Option<String>,
    order_type: Option<String>,
) -> SimResult<()> {
    let config = Config::load_or_create(config_path)?;

    let mut params = SimulationParameters {
        exchange: config.feed.exchange.clone(),
        asset: config.feed.symbol.clone(),
        order_type: config.simulation.order_type,
        quantity: config.simulation.quantity_usd,
        volatility_pct: config.simulation.volatility_pct,
        fee_tier: config.simulation.fee_tier,
    };

    if let Some(q) = quantity {
        params.quantity = q;
    }
    if let Some(v) = volatility {
        params.volatility_pct = v;
    }
    if let Some(tier) = fee_tier {
        params.fee_tier = FeeTier::parse(&tier);
    }
    if let Some(ot) = order_type {
        params.order_type = OrderType::parse(&ot)?;
    }
    params.validate()?;

    info!(
        "🚀 Estimating costs for {} {} on {} (quantity ${}, {} fees)",
        params.order_type, params.asset, params.exchange, params.quantity, params.fee_tier
    );

    let (mut feed, events, state_rx) =
        OrderBookFeed::new(config.feed.url.clone(), config.reconnect.clone());
    let (orchestrator, view_rx) =
        SimulationOrchestrator::new(CostModelEngine::default(), params);

    // Parameters are fixed for the lifetime of the CLI run; the channel is
    // the seam an interactive front end plugs into
    let (_param_tx, param_rx) = mpsc::channel::<SimulationParameters>(8);

    feed.connect()?;

    // Periodic status logging stands in for a UI collaborator
    let status_view = view_rx.clone();
    let status_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let view = status_view.borrow().clone();
            match &view.result {
                Some(result) => {
                    info!(
                        "💰 net ${:.4} | slippage {:.4}% | impact {:.4}% | fees ${:.4} | maker {:.2} | {} | updated {}",
                        result.net_cost,
                        result.expected_slippage_pct,
                        result.expected_market_impact_pct,
                        result.expected_fees,
                        result.maker_taker_proportion,
                        if view.connected { "connected" } else { "disconnected" },
                        view.last_updated_display(),
                    );
                }
                None => {
                    info!(
                        "⏳ Waiting for first snapshot ({})",
                        if view.connected { "connected" } else { "disconnected" }
                    );
                }
            }
        }
    });

    tokio::select! {
        _ = orchestrator.run(events, state_rx, param_rx) => {
            info!("Feed event stream ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    status_task.abort();
    feed.disconnect();
    Ok(())
}
