//! # Console Board Example
//!
//! Plays a board from the terminal against a live server:
//!
//! 1. Connect to a board server via WebSocket
//! 2. Wait for the seat assignment
//! 3. Type a cell number (0-8) to play, `r` to reset, `q` to quit
//! 4. Shut down gracefully on `q`, Ctrl+C, or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start a board server on localhost:8081, then:
//! cargo run --example console_board
//!
//! # Override the server URL:
//! PLAYBOOK_URL=ws://my-server:8081/game cargo run --example console_board
//!
//! # Resume a seat from a previous run:
//! PLAYBOOK_CLIENT_ID=<token> cargo run --example console_board
//! ```

use playbook_client::{GameEvent, PlaybookClient, PlaybookConfig};
use tokio::io::AsyncBufReadExt;

/// Default server URL when `PLAYBOOK_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:8081/game";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("PLAYBOOK_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    tracing::info!("Connecting to {url}");

    let mut config = PlaybookConfig::new(url);
    // Reuse a seat token from a previous run, if one was kept.
    if let Ok(token) = std::env::var("PLAYBOOK_CLIENT_ID") {
        config = config.with_client_id(token);
    }

    // ── Connect ─────────────────────────────────────────────────────
    // Dials the WebSocket and spawns the background task that drives
    // the transport and emits events on `event_rx`.
    let (mut client, mut event_rx) = PlaybookClient::connect(config).await?;

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    println!("Type a cell number (0-8) to play, r to reset, q to quit.");

    // ── Event loop ──────────────────────────────────────────────────
    // Listen for server events, terminal input, and Ctrl+C at once.
    loop {
        tokio::select! {
            // Branch 1: Incoming event from the server (or transport layer).
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    GameEvent::Connected => {
                        tracing::info!("Transport connected, awaiting a seat...");
                    }
                    GameEvent::Joined { client_id, player } => {
                        tracing::info!("Seated as {player} (seat token: {client_id})");
                    }
                    GameEvent::BoardUpdated { board, win_line } => {
                        println!("\n{board}\n");
                        if let Some(line) = win_line {
                            tracing::debug!("winning line: {line:?}");
                        }
                    }
                    GameEvent::StatusChanged(status) => {
                        println!("{status}");
                    }
                    GameEvent::PeerReset => {
                        tracing::info!("The other player reset the board");
                    }
                    GameEvent::PeerLeft => {
                        tracing::info!("The other player left the board");
                    }
                    GameEvent::BoardComplete => {
                        tracing::info!("This board is finished for good");
                    }
                    GameEvent::RestartVisible { visible } => {
                        if !visible {
                            println!("(restarting is no longer available)");
                        }
                    }
                    GameEvent::ProtocolError { detail } => {
                        tracing::error!("Protocol error: {detail}");
                    }
                    GameEvent::Disconnected { reason } => {
                        tracing::warn!(
                            "Disconnected: {}",
                            reason.as_deref().unwrap_or("server closed the connection")
                        );
                        break;
                    }
                }
            }

            // Branch 2: A line of input from the terminal.
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "" => {}
                    "q" => break,
                    "r" => {
                        if let Err(e) = client.request_reset() {
                            tracing::error!("Reset failed: {e}");
                        }
                    }
                    text => match text.parse::<usize>() {
                        Ok(cell) => {
                            if let Err(e) = client.play(cell) {
                                tracing::error!("Move failed: {e}");
                            }
                        }
                        Err(_) => {
                            println!("Type a cell number (0-8), r to reset, or q to quit.");
                        }
                    },
                }
            }

            // Branch 3: Ctrl+C, shut down gracefully.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down...");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Client shut down. Goodbye!");
    Ok(())
}
