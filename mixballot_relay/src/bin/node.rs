//! Mix relay: peels one onion layer off every ballot in a batch, shuffles
//! the batch, and commits to the permutation.

use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Result;
use clap::Parser;

use mixballot_relay::api;
use mixballot_relay::config::NodeConfig;
use mixballot_relay::init_tracing;

/// Mixballot mix-node relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on for HTTP requests
    #[arg(short, long, default_value = "4001")]
    port: u16,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = NodeConfig::from_env();
    if config.generated {
        tracing::warn!("MIXBALLOT_NODE_SECRET_KEY not set, generated a fresh keypair");
    }

    let state = api::NodeState::new(config);
    tracing::info!(public_key = %state.public_hex(), "mix-node starting");

    let router = api::router(state);
    let listen_addr = SocketAddr::from_str(&format!("0.0.0.0:{}", args.port))?;
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("mix-node listening on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("received shutdown signal");
        })
        .await?;

    Ok(())
}
