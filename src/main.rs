//! alertdispatch - deliver one notification from a JSON destination request.

use alertdispatch::{cli::Cli, config::Config, context::DispatchContext, message::DestinationRequest};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        tracing_subscriber::fmt().init();
        error!("Failed to load configuration: {}", err);
        std::process::exit(1);
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("alertdispatch starting up...");
    info!(
        max_connections = config.transport.max_connections,
        max_connections_per_route = config.transport.max_connections_per_route,
        blocked_ranges = config.transport.blocked_ranges.len(),
        destinations = ?config.destinations.enabled,
        "Configuration loaded"
    );

    let document = match &cli.message {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read the request from stdin")?;
            buffer
        }
    };
    let request: DestinationRequest =
        serde_json::from_str(&document).context("invalid destination request")?;

    let context = DispatchContext::builder(config).build().await?;
    let result = context.publish_request(request).await;
    context.shutdown().await;

    match result {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, kind = e.kind(), "Delivery failed");
            Err(e.into())
        }
    }
}
