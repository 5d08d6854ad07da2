use std::path::PathBuf;

use ::tracing::{error, info_span};
use anyhow::{Context, Result};
use clap::Parser;
use service::Service;

mod bulk_delete;
mod config;
mod dispatcher;
mod http_objects;
mod routes;
mod schema_store;
mod service;
mod tracing;
use tracing::setup_tracing;

#[cfg(test)]
mod testing;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "config file", help = "Path to config file")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Address to listen on, overrides the config file")]
    listen_addr: Option<String>,
}

fn load_config(cli: &Cli) -> Result<config::ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => config::ServerConfig::from_path(&path.to_string_lossy())?,
        None => config::ServerConfig::from_env()?,
    };
    if let Some(listen_addr) = &cli.listen_addr {
        config.listen_addr = listen_addr.clone();
        config.validate()?;
    }
    Ok(config)
}

/// Connects the service and serves until shutdown. Fails on the startup
/// errors the process cannot recover from.
async fn run(config: config::ServerConfig) -> Result<()> {
    let service = Service::new(config)
        .await
        .context("Error creating service")?;
    service.start().await.context("Error starting service")
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error loading configuration: {:?}", err);
            std::process::exit(1);
        }
    };

    let tracing_guard = match setup_tracing(&config) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error setting up tracing: {:?}", err);
            std::process::exit(1);
        }
    };

    let root_span = info_span!("pgfaas", env = config.env);
    let _guard = root_span.enter();

    let result = run(config).await;
    if let Err(err) = &result {
        error!("{:?}", err);
    }

    // export traces before shutdown
    tracing_guard.shutdown();
    if result.is_err() {
        std::process::exit(1);
    }
}
