//! # TLS Endpoint
//!
//! This binary serves the library's fixed `Secure connection established` response over HTTPS
//! until it receives Ctrl-C.
//!
//! Configuration comes from `tls-endpoint.toml` (or `--config`), `TLS_ENDPOINT_*` environment
//! variables and the flags below, in increasing precedence.
use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::Parser;
use tls_endpoint::{
    ConfigOverrides, ListenerConfig, ListenerError, SecureGreeting, config::ConfigError, serve,
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Log filter used when the configuration could not be loaded.
const FALLBACK_LOG_LEVEL: &str = "info";

#[derive(Parser, Debug)]
#[command(name = "tls-endpoint", version)]
#[command(about = "Answers every HTTPS request with a fixed response", long_about = None)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long)]
    address: Option<String>,

    /// Port to bind
    #[arg(short, long)]
    port: Option<u16>,

    /// PEM certificate chain
    #[arg(long)]
    cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long)]
    key: Option<PathBuf>,
}

impl Cli {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            config_file: self.config,
            bind_address: self.address,
            bind_port: self.port,
            cert_path: self.cert,
            key_path: self.key,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = ListenerConfig::load(&Cli::parse().into_overrides());

    init_tracing(
        config
            .as_ref()
            .map_or(FALLBACK_LOG_LEVEL, |config| config.log_level.as_str()),
    );

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "startup failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(config: Result<ListenerConfig, ConfigError>) -> Result<(), ListenerError> {
    let config = config?;
    info!(
        address = %config.address(),
        cert = %config.cert_path.display(),
        key = %config.key_path.display(),
        "configuration loaded"
    );

    let server = serve(&config, Arc::new(SecureGreeting)).await?;
    info!("Server running at https://{}/", server.local_addr());

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("shutdown signal received");
            server.close();
        }
        Err(error) => {
            warn!(%error, "cannot listen for shutdown signal, serving until terminated");
        }
    }

    server.stopped().await;
    info!("shutdown complete");
    Ok(())
}
