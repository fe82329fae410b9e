//! Result courier binary.
//!
//! # Usage
//!
//! ```bash
//! # With config file
//! result-courier --config courier.toml
//!
//! # With environment variables only
//! COURIER_TELEGRAM__BOT_TOKEN=... COURIER_TELEGRAM__CHAT_ID=... result-courier
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use result_courier::config::CourierConfig;
use result_courier::logging::init_logging;
use result_courier::render::CommandRenderer;
use result_courier::{Courier, ReqwestHttpClient, RunOptions, TelegramTransport, liveness};

/// Waits for the result site, delivers results for a list of registration
/// numbers, then answers requests over chat.
#[derive(Parser, Debug)]
#[command(name = "result-courier")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Registration number file, one per line (overrides pipeline.identifier_file)
    #[arg(short, long)]
    identifiers: Option<PathBuf>,

    /// Start the file run without waiting for the site
    #[arg(long)]
    skip_monitor: bool,

    /// Exit after the file run instead of answering chat requests
    #[arg(long)]
    no_interactive: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = CourierConfig::load(args.config.as_deref())?;
    if let Some(identifiers) = args.identifiers {
        config.pipeline.identifier_file = identifiers;
    }

    init_logging(&config.logging);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting result courier");

    let shutdown = CancellationToken::new();

    let liveness_task = if config.liveness.enabled {
        let liveness_config = config.liveness.clone();
        let token = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = liveness::serve(&liveness_config, token).await {
                error!(error = %e, "Liveness endpoint failed");
            }
        }))
    } else {
        None
    };

    let http = Arc::new(ReqwestHttpClient::new()?);
    let renderer = Arc::new(CommandRenderer::new(config.renderer.clone()));
    let transport = Arc::new(TelegramTransport::new(&config.telegram)?);
    let courier = Courier::new(config, http, renderer, transport);

    let options = RunOptions {
        skip_monitor: args.skip_monitor,
        interactive: !args.no_interactive,
    };

    let mut signalled = tokio::select! {
        _ = courier.run(options, shutdown.clone()) => false,
        _ = shutdown_signal() => true,
    };

    // The keep-alive endpoint outlives the courier phases; a stopped
    // interactive mode does not take it down.
    if !signalled && options.interactive && liveness_task.is_some() {
        info!("Courier phases finished, liveness endpoint stays up until shutdown");
        shutdown_signal().await;
        signalled = true;
    }
    if signalled {
        info!("Shutdown signal received");
        courier.channel().notify("🛑 Monitor stopped manually").await;
    }

    shutdown.cancel();
    if let Some(task) = liveness_task {
        let _ = task.await;
    }

    info!("Result courier shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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
