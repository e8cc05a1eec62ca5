//! greenlight API server
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────────┐
//!                        │                        SERVER                             │
//!   Client Request       │  ┌─────────┐  ┌───────────────┐  ┌───────────┐           │
//!   ─────────────────────┼─▶│ metrics │─▶│ recover_panic │─▶│enable_cors│           │
//!                        │  └─────────┘  └───────────────┘  └─────┬─────┘           │
//!                        │                                        ▼                 │
//!                        │  ┌──────────────┐  ┌──────────────┐  ┌────────────┐      │
//!                        │  │  permission  │◀─│ authenticate │◀─│ rate_limit │      │
//!                        │  │    gates     │  └──────────────┘  └────────────┘      │
//!                        │  └──────┬───────┘                                        │
//!                        │         ▼                                                │
//!   Client Response      │  ┌──────────────┐   ┌────────────┐   ┌───────────────┐   │
//!   ◀────────────────────┼──│   handlers   │──▶│   store    │   │  background   │   │
//!                        │  └──────────────┘   │ (versioned)│   │  task runner  │   │
//!                        │                     └────────────┘   └───────────────┘   │
//!                        │                                                          │
//!                        │  lifecycle: Starting → Running → Draining → Stopped      │
//!                        └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use greenlight::config::{self, AppConfig};
use greenlight::data::InMemoryStore;
use greenlight::lifecycle::signals;
use greenlight::observability;
use greenlight::Application;

#[derive(Parser, Debug)]
#[command(name = "greenlight")]
#[command(about = "JSON API server with rate limiting, authentication and graceful shutdown", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API server port
    #[arg(long)]
    port: Option<u16>,

    /// Environment (development|staging|production)
    #[arg(long)]
    env: Option<String>,

    /// Rate limiter maximum requests per second
    #[arg(long)]
    limiter_rps: Option<f64>,

    /// Rate limiter maximum burst
    #[arg(long)]
    limiter_burst: Option<u32>,

    /// Enable rate limiter
    #[arg(long)]
    limiter_enabled: Option<bool>,

    /// Trusted CORS origins (space separated)
    #[arg(long)]
    cors_trusted_origins: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            let host = config
                .listener
                .bind_address
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            config.listener.bind_address = format!("{host}:{port}");
        }
        if let Some(env) = self.env {
            config.env = env;
        }
        if let Some(rps) = self.limiter_rps {
            config.limiter.rps = rps;
        }
        if let Some(burst) = self.limiter_burst {
            config.limiter.burst = burst;
        }
        if let Some(enabled) = self.limiter_enabled {
            config.limiter.enabled = enabled;
        }
        if let Some(origins) = self.cors_trusted_origins {
            config.cors.trusted_origins = origins.split_whitespace().map(str::to_string).collect();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };
    cli.apply(&mut config);
    config::validation::validate_config(&config).map_err(config::ConfigError::Validation)?;

    observability::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "greenlight starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        env = %config.env,
        limiter_rps = config.limiter.rps,
        limiter_burst = config.limiter.burst,
        limiter_enabled = config.limiter.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        observability::init_metrics(addr)?;
    }

    let deadline = config.shutdown.deadline();
    let server = Application::new(config, InMemoryStore::new()).start().await?;

    server.run_until_signal(signals::terminate(), deadline).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
