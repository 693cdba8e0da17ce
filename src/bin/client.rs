//! Peerlink CLI client
//!
//! Connects to a signalling server, announces `PEER_ID`, then sends stdin
//! lines and prints whatever the server sends back.

use anyhow::Context;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use peerlink::signal::{run_session, ClientEnd, SignalClient};
use peerlink::config::LogConfig;
use peerlink::{logging, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries received messages, logs go to stderr
    logging::init(&LogConfig::from_env(), true);

    let config = Config::from_env()
        .map_err(|e| {
            error!("Failed to load configuration: {}", e);
            e
        })
        .context("failed to load configuration")?;

    let client = SignalClient::new(config.client.clone());
    let ws = client
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", config.client.uri))?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => interrupt.cancel(),
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    eprintln!("Enter message to send");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let end = run_session(ws, stdin, &mut stdout, cancel).await?;

    match end {
        ClientEnd::ServerClosed => info!("Server closed the connection"),
        ClientEnd::InputClosed => info!("Input closed, connection closed"),
        ClientEnd::Interrupted => info!("Interrupted"),
    }

    Ok(())
}
