//! Circuit manager process.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller (route planner, tracking poller, payout job)
//!       │
//!       ▼
//!   ┌──────────────────┐    ┌──────────────────┐    ┌──────────────────┐
//!   │ DownstreamClient │───▶│ GuardedExecutor  │───▶│ BreakerRegistry  │
//!   │  (per service)   │    │ fallback on open │    │ lazy, layered    │
//!   └──────────────────┘    └────────┬─────────┘    └────────┬─────────┘
//!                                    │                       ▼
//!                                    │              ┌──────────────────┐
//!                                    └─────────────▶│  CircuitBreaker  │──▶ downstream
//!                                                   │ closed/open/half │    service
//!                                                   └────────┬─────────┘
//!                                                            ▼
//!                                                   listeners: tracing + metrics
//!
//!   admin API (/admin/*): status, breaker snapshots, reset-all
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use circuit_manager::config::watcher::ConfigWatcher;
use circuit_manager::http::HttpServer;
use circuit_manager::lifecycle::{signals, startup, Shutdown, StartupError};
use circuit_manager::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "circuit-manager")]
#[command(about = "Circuit breaker manager for downstream service calls", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults plus CIRCUIT_* variables
    /// are used when omitted.
    #[arg(short, long, env = "CIRCUIT_CONFIG")]
    config: Option<PathBuf>,

    /// Watch the configuration file and apply changes to new breakers.
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = startup::load_startup_config(args.config.as_deref())?;
    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "circuit-manager starting");
    tracing::info!(
        admin_address = %config.admin.bind_address,
        failure_threshold = config.breakers.defaults.failure_threshold,
        failure_rate_threshold = config.breakers.defaults.failure_rate_threshold,
        reset_timeout_ms = config.breakers.defaults.reset_timeout_ms,
        service_overrides = config.breakers.services.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr).map_err(StartupError::from)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.admin.bind_address.clone();
    let context = startup::build_context(config)?;

    // The watcher handle must outlive the server.
    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let _watcher = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = watcher.run().map_err(StartupError::from)?;
            tokio::spawn(async move {
                while let Some(config) = updates.recv().await {
                    if config_tx.send(config).is_err() {
                        break;
                    }
                }
            });
            Some(handle)
        }
        (None, true) => {
            tracing::warn!("--watch ignored: no configuration file given");
            None
        }
        _ => None,
    };

    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(context);
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, config_updates, server_shutdown));

    signals::shutdown_on_signal(&shutdown).await;

    server_task
        .await?
        .map_err(StartupError::Serve)?;

    tracing::info!("Shutdown complete");
    Ok(())
}
