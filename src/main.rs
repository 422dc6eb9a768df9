//! SSR gateway
//!
//! Serves a server-rendered web application: static client bundle, public
//! files, an API reverse proxy, and HTML rendering for everything else.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                   SSR GATEWAY                     │
//!                        │                                                   │
//!   Client Request       │  ┌─────────┐   ┌────────────┐   ┌─────────────┐  │
//!   ─────────────────────┼─▶│   net   │──▶│ middleware │──▶│  /api/v1/*  │──┼──▶ API upstream
//!                        │  │listener │   │ nonce/hpp/ │   │    proxy    │  │
//!                        │  └─────────┘   │  headers   │   └─────────────┘  │
//!                        │                └─────┬──────┘                    │
//!                        │                      ▼                           │
//!   Client Response      │              ┌──────────────┐                    │
//!   ◀────────────────────┼──────────────│   pipeline   │                    │
//!                        │              │ bundle → pub │                    │
//!                        │              │ → sw → ssr   │                    │
//!                        │              │ → 404        │                    │
//!                        │              └──────────────┘                    │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use ssr_gateway::config::load_config;
use ssr_gateway::http::ShellRenderer;
use ssr_gateway::lifecycle::{launch, wait_for_signal};
use ssr_gateway::observability::{logging, metrics, LogFormat};

/// Command-line flags. Everything else comes from the environment.
#[derive(Debug, Parser)]
#[command(name = "ssr-gateway", version, about)]
struct Cli {
    /// Optional TOML file with settings; environment variables take precedence.
    #[arg(long, env = "SSR_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logging::init(LogFormat::from_env())?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ssr-gateway starting");

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    tracing::info!(
        address = %config.listener.socket_addr(),
        mode = %config.mode,
        bundle_path = %config.bundle.http_path,
        bundle_dir = %config.bundle.client_dir.display(),
        public_dir = %config.public_dir.display(),
        cache_max_age_secs = config.bundle.cache_max_age.as_secs(),
        "Configuration loaded"
    );

    if let Some(addr) = config.observability.metrics_address {
        metrics::init_metrics(addr)?;
    }

    let renderer = Arc::new(ShellRenderer::from_bundle(&config.bundle));
    let handle = launch(config, renderer).await?;

    wait_for_signal().await?;
    handle.close().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
