//! tickavg - entry point.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tickavg_app::config::DEFAULT_CONFIG_PATH;
use tickavg_app::{AppConfig, Application};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Binance trade collector with 24h average and SMA queries.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true, env = "TICKAVG_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Collect trades until Ctrl-C
    Collect {
        /// Symbols to collect (defaults to collect.symbols)
        symbols: Vec<String>,
        /// Records per batch (defaults to collect.batch_size)
        #[arg(short, long)]
        batch_size: Option<usize>,
    },
    /// Print the 24h average price
    Avg24h { symbol: String },
    /// Print the simple moving average
    Sma {
        symbol: String,
        /// Number of data points
        n: usize,
        /// Period code: 1w, 1d, 30m, 5m or 1m
        period: String,
        /// Only records at or before this time (RFC 3339 or "YYYY-MM-DD HH:MM:SS" UTC)
        #[arg(short, long)]
        start: Option<String>,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tickavg_ws::init_crypto();
    let args = Args::parse();
    tickavg_telemetry::init_logging()?;

    info!(config_path = %args.config, "Starting tickavg v{}", env!("CARGO_PKG_VERSION"));
    let config = AppConfig::load(&args.config)?;

    match args.command {
        Command::ShowConfig => {
            print!("{}", config.to_toml()?);
        }
        Command::Serve => {
            let app = Application::new(config)?;
            app.serve(shutdown_on_ctrl_c()).await?;
        }
        Command::Collect {
            symbols,
            batch_size,
        } => {
            let symbols = if symbols.is_empty() {
                config.collect.symbols.clone()
            } else {
                symbols
            };
            let batch_size = batch_size.unwrap_or(config.collect.batch_size);
            let app = Application::new(config)?;
            app.collect(&symbols, batch_size, shutdown_on_ctrl_c())
                .await?;
        }
        Command::Avg24h { symbol } => {
            let app = Application::new(config)?;
            println!("{}", app.average_24h(&symbol).await?);
        }
        Command::Sma {
            symbol,
            n,
            period,
            start,
        } => {
            let app = Application::new(config)?;
            let outcome = app
                .simple_moving_average(&symbol, n, &period, start.as_deref())
                .await?;
            println!("{outcome}");
        }
    }

    Ok(())
}

/// Token cancelled on the first Ctrl-C.
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
        }
        trigger.cancel();
    });
    token
}
