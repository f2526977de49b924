//! Greenhouse edge gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                      GATEWAY                          │
//!                    │                                                       │
//!  Client Request    │  ┌───────────┐   ┌──────────────┐   ┌─────────────┐  │
//!  ──────────────────┼─▶│ transport │──▶│   routing    │──▶│  security   │  │
//!                    │  │ id/trace/ │   │ /api/<svc>   │   │ ip → auth → │  │
//!                    │  │ timeouts  │   │ /health ...  │   │ user → cors │  │
//!                    │  └───────────┘   └──────────────┘   └──────┬──────┘  │
//!                    │                                            │         │
//!  Client Response   │                  ┌──────────────┐          ▼         │
//!  ◀─────────────────┼──────────────────│ http::proxy  │◀─── dispatch ──────┼──▶ Backend
//!                    │                  └──────────────┘                    │    Service
//!                    │                                                       │
//!                    │  config · observability · lifecycle (cross-cutting)   │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use greenhouse_gateway::config::{load_config, ConfigError, LogFormat, ProcessEnv};
use greenhouse_gateway::lifecycle::{self, Shutdown};
use greenhouse_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "greenhouse-gateway")]
#[command(about = "Edge API gateway for the greenhouse backend services", long_about = None)]
struct Cli {
    /// Load variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Validate the configuration, print it (secrets redacted) and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Variables already set in the process win over the file.
    let env_file = match &cli.env_file {
        Some(path) => dotenvy::from_path(path).map_err(ConfigError::EnvFile),
        None => match dotenvy::dotenv() {
            Ok(_) => Ok(()),
            Err(e) if e.not_found() => Ok(()),
            Err(e) => Err(ConfigError::EnvFile(e)),
        },
    };

    logging::init(LogFormat::from_source(&ProcessEnv));
    env_file?;

    tracing::info!("greenhouse-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    let config = load_config(&ProcessEnv).inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;

    if cli.check {
        let summary = serde_json::to_string_pretty(&config)?;
        lifecycle::prepare(config)?;
        println!("{summary}");
        return Ok(());
    }

    let metrics_address = config.observability.metrics_address.clone();
    let bind_address = config.server.bind_address();
    let server = lifecycle::prepare(config)?;

    if !metrics_address.is_empty() {
        let addr: SocketAddr = metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&bind_address).await.inspect_err(|e| {
        tracing::error!(address = %bind_address, error = %e, "Failed to bind listener");
    })?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        lifecycle::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
