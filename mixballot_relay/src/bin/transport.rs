//! Transport relay: carries onion-wrapped JSON-RPC traffic. Entry and middle
//! relays peel one layer and forward to the next hop; the exit relay performs
//! the final JSON-RPC call.

use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Result;
use clap::Parser;

use mixballot_relay::config::TransportConfig;
use mixballot_relay::init_tracing;
use mixballot_relay::transport;

/// Mixballot transport relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on for HTTP requests
    #[arg(short, long, default_value = "9100")]
    port: u16,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = TransportConfig::from_env();
    if config.generated {
        tracing::warn!("MIXBALLOT_TRANSPORT_SECRET_KEY not set, generated a fresh keypair");
    }

    let state = transport::TransportState::new(config);
    tracing::info!(
        role = state.role_name(),
        public_key = %state.public_hex(),
        "transport relay starting"
    );

    let router = transport::router(state);
    let listen_addr = SocketAddr::from_str(&format!("0.0.0.0:{}", args.port))?;
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("transport relay listening on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("received shutdown signal");
        })
        .await?;

    Ok(())
}
