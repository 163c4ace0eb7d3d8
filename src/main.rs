//! Score Relayer
//!
//! Entry point for the relayer service. Loads configuration, connects the
//! coordination store and record store, reconciles the relayer pool and runs
//! one worker per queue lane until SIGINT or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use score_relayer::config::Config;
use score_relayer::context::ServiceContext;
use score_relayer::endpoints;
use score_relayer::relayer_pool::Reconciliation;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "relayer.toml", env = "RELAYER_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration before logging so json_logs can take effect
    let (config, from_file) = load_config(&args.config)?;
    init_logging(args.verbose, config.monitoring.json_logs)?;
    if !from_file {
        warn!("Config file '{}' not found, using defaults", args.config);
    }

    info!("Starting score relayer");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(config = %args.config, chains = config.chains.len(), "Configuration loaded");

    config.validate().context("Invalid configuration")?;

    if config.monitoring.enable_metrics {
        let metrics_port = config.monitoring.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = endpoints::endpoint_server(metrics_port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let ctx = ServiceContext::connect(config)
        .await
        .context("Failed to initialize services")?;

    match ctx
        .reconcile_relayers()
        .await
        .context("Failed to reconcile relayer pool")?
    {
        Reconciliation::Unchanged => info!("Relayer pool unchanged"),
        Reconciliation::Reseeded { count } => info!(count, "Relayer pool reseeded"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut workers = JoinSet::new();

    let tx_worker = ctx.tx_worker();
    info!(lane = %tx_worker.lane(), "Spawning worker");
    workers.spawn(tx_worker.run(shutdown_rx.clone()));

    match ctx.score_worker().context("Failed to load score publisher key")? {
        Some(score_worker) => {
            info!(lane = %score_worker.lane(), "Spawning worker");
            workers.spawn(score_worker.run(shutdown_rx.clone()));
        }
        None => warn!("SCORE_PUBLISHER_PRIVATE_KEY not set, send-user-score lane is not consumed"),
    }

    wait_for_shutdown().await?;
    info!("Received shutdown signal, draining workers");
    let _ = shutdown_tx.send(true);

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!("Worker task failed: {}", e);
        }
    }
    ctx.close();

    info!("Shut down gracefully");
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "score_relayer=debug,info"
    } else {
        "score_relayer=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .context("Failed to initialize logging")?;
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults.
///
/// The flag is false when the file was missing.
fn load_config(path: &str) -> Result<(Config, bool)> {
    if std::path::Path::new(path).exists() {
        let config = Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))?;
        Ok((config, true))
    } else {
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config.apply_env(|name| std::env::var(name).ok());
        Ok((config, false))
    }
}

/// Resolve on SIGINT or SIGTERM
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("Failed to listen for SIGINT")?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await.context("Failed to listen for SIGINT")?;

    Ok(())
}
