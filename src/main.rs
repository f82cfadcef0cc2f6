//! Line Chat Relay - Entry Point
//!
//! Loads configuration, starts the relay engine and runs the TCP accept loop.

use std::env;

use tokio::net::TcpListener;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use line_relay::{Engine, RelayConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=line_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("line_relay=info")),
        )
        .init();

    // Optional JSON file via LINE_RELAY_CONFIG; first argument overrides the bind address
    let mut config = RelayConfig::from_env()?;
    if let Some(addr) = env::args().nth(1) {
        config.bind_addr = addr;
    }
    config.validate()?;

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Line relay listening on {}", config.bind_addr);

    let engine = Engine::start(config);

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let engine = engine.clone();

                tokio::spawn(async move {
                    match engine.serve_connection(stream, addr.to_string()).await {
                        Ok(reason) => debug!("Connection {} closed: {:?}", addr, reason),
                        Err(e) => error!("Connection handler error for {}: {}", addr, e),
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
