//! hydra-mock: programmable HTTP interception server.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use hydra_mock::config::{load_config, HydraConfig};
use hydra_mock::lifecycle::{build_summoner, wait_for_signal, Shutdown};
use hydra_mock::observability::{init_logging, init_metrics};
use hydra_mock::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "hydra-mock", version, about = "Programmable HTTP interception server")]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => HydraConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "hydra-mock starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        plugins = config.plugins.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let config = Arc::new(config);
    let summoner = Arc::new(build_summoner(config.clone())?);

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    let server = HttpServer::new(config.clone(), summoner);
    match &config.listener.tls {
        Some(tls) => {
            let addr: SocketAddr = config.listener.bind_address.parse()?;
            server.run_tls(addr, tls, shutdown.wait()).await?;
        }
        None => {
            let listener = TcpListener::bind(&config.listener.bind_address).await?;
            server.run(listener, shutdown.wait()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
