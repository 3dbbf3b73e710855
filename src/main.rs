//! TCG Stock Watch command line
//!
//! Thin wrapper around the runner: loads configuration, sets up logging,
//! wires the HTTP fetcher and the notifier, then runs the selected mode.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tcg_stock_watch::application::Runner;
use tcg_stock_watch::infrastructure::config::AppConfig;
use tcg_stock_watch::infrastructure::logging::init_logging;
use tcg_stock_watch::infrastructure::{
    HttpFetcher, LogNotifier, Notifier, RetryingFetcher, ScraperRegistry, TelegramNotifier,
};

#[derive(Parser)]
#[command(name = "tcg-stock-watch")]
#[command(about = "Watches trading-card shops and notifies on restocks")]
#[command(version)]
struct Cli {
    /// Configuration file path (default: config/stock_watch.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides `paths.data_dir`)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log messages instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Run a single scan cycle
    Once,
    /// Scan repeatedly until interrupted
    Loop,
    /// Delete notification state and product cache
    Reset,
    /// Prune expired cache entries and rewrite state files
    Clean,
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(data_dir) = &cli.data_dir {
        config.paths.data_dir.clone_from(data_dir);
    }
    if cli.dry_run {
        config.notification.dry_run = true;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn build_notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>> {
    if config.notification.dry_run {
        return Ok(Arc::new(LogNotifier));
    }
    match config.telegram_credentials() {
        Some((token, chat_id)) => {
            let notifier = TelegramNotifier::new(token, chat_id).context("Failed to create Telegram client")?;
            Ok(Arc::new(notifier))
        }
        None => {
            warn!("⚠️ No Telegram credentials configured, notifications are only logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let _log_guard = init_logging(&config.logging, &config.log_dir())?;

    let mode = cli.mode.unwrap_or(Mode::Once);
    info!("🚀 TCG Stock Watch v{} starting ({:?})", env!("CARGO_PKG_VERSION"), mode);

    let fetcher = RetryingFetcher::new(HttpFetcher::new(&config.http)?, config.retry.clone());
    let notifier = build_notifier(&config)?;
    let runner = Runner::new(config, fetcher, notifier, ScraperRegistry::default());

    match mode {
        Mode::Once => {
            let report = runner.run_once().await?;
            info!(
                "📊 {} candidates, {} matched, {} notified, {}/{} sources failed",
                report.candidates,
                report.matched,
                report.notified(),
                report.sources_failed,
                report.sources_total
            );
        }
        Mode::Loop => {
            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("🛑 Ctrl-C received, stopping after the current cycle");
                        signal_token.cancel();
                    }
                    Err(e) => warn!("⚠️ Cannot listen for Ctrl-C: {}", e),
                }
            });
            runner.run_forever(shutdown).await?;
        }
        Mode::Reset => {
            runner.reset().await?;
        }
        Mode::Clean => {
            runner.clean().await?;
        }
    }
    Ok(())
}
