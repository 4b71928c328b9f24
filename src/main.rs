//! Format gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────┐
//!                      │                 FORMAT GATEWAY                 │
//!   Client Request     │  ┌────────────┐   ┌──────────┐   ┌──────────┐ │
//!   ───────────────────┼─▶│ rate limit │──▶│ handlers │──▶│ executor │─┼──▶ Language-model
//!                      │  │ (per key)  │   │          │   │ retry+cb │ │     API
//!   Client Response    │  └────────────┘   └──────────┘   └──────────┘ │
//!   ◀──────────────────┼──────────── response mapping ◀────────────────┤
//!                      │                                                │
//!                      │  config · observability · admin · lifecycle    │
//!                      └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use format_gateway::config::{loader, GatewayConfig};
use format_gateway::lifecycle::{wait_for_signal, Shutdown};
use format_gateway::observability::{logging, metrics};
use format_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "format-gateway", version, about = "Resilient gateway for a language-model formatting API")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

fn load(args: &Args) -> Result<GatewayConfig, loader::ConfigError> {
    let mut config = match &args.config {
        Some(path) => loader::parse_config(&std::fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = &args.bind {
        config.listener.bind_address = bind.clone();
    }
    loader::finalize(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load(&args)?;

    if args.check {
        println!("Configuration OK");
        return Ok(());
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("format-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        max_attempts = config.retry.max_attempts,
        failure_threshold = config.circuit_breaker.failure_threshold,
        rate_limit = config.rate_limit.max_requests,
        window_ms = config.rate_limit.window_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let server = HttpServer::new(config, shutdown)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
