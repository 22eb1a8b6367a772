//! # Scripted Match Example
//!
//! Shows how to implement the [`Transport`] trait with a simple in-process
//! loopback channel, then plays a complete match against a canned server.
//! This is useful for:
//!
//! - **Testing**: run a full game without a real server
//! - **Custom backends**: adapt any I/O layer (TCP, QUIC, WebRTC data channels)
//!
//! ## Running
//!
//! ```sh
//! cargo run --example scripted_match
//! ```

use async_trait::async_trait;
use playbook_client::{
    GameEvent, GameStatus, PlaybookClient, PlaybookConfig, PlaybookError, Transport,
};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: Define a channel-based "loopback" transport
// ─────────────────────────────────────────────────────────────────────

/// A loopback transport that shuttles frames through in-process channels.
///
/// This transport consists of two halves:
/// - The **client half** (`LoopbackTransport`) implements [`Transport`] and
///   is handed to `PlaybookClient::start`.
/// - The **server half** (`LoopbackServer`) lets a canned opponent read what
///   the client sent and inject responses.
pub struct LoopbackTransport {
    /// Frames the client sends go here (server reads from the other end).
    tx: mpsc::UnboundedSender<String>,
    /// Frames the server sends arrive here (client reads them).
    rx: mpsc::UnboundedReceiver<String>,
}

/// The "server side" of the loopback, used to drive the conversation.
pub struct LoopbackServer {
    /// Read what the client sent.
    pub rx: mpsc::UnboundedReceiver<String>,
    /// Send frames to the client (as if they came from a server).
    pub tx: mpsc::UnboundedSender<String>,
}

/// Create a connected `(transport, server)` pair.
fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    // Client to server channel
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    // Server to client channel
    let (server_tx, client_rx) = mpsc::unbounded_channel();

    let transport = LoopbackTransport {
        tx: client_tx,
        rx: client_rx,
    };
    let server = LoopbackServer {
        rx: server_rx,
        tx: server_tx,
    };

    (transport, server)
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Implement the Transport trait
// ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl Transport for LoopbackTransport {
    /// Send a text frame to the "server" side of the loopback.
    async fn send(&mut self, frame: String) -> Result<(), PlaybookError> {
        self.tx
            .send(frame)
            .map_err(|e| PlaybookError::TransportSend(e.to_string()))
    }

    /// Receive the next frame from the "server" side.
    ///
    /// Returns `None` when the server channel is closed, which is how the
    /// client discovers that the connection has ended.
    ///
    /// This method is **cancel-safe** because `mpsc::UnboundedReceiver::recv`
    /// is cancel-safe.
    async fn recv(&mut self) -> Option<Result<String, PlaybookError>> {
        self.rx.recv().await.map(Ok)
    }

    /// Close is a no-op for channels; dropping is sufficient.
    async fn close(&mut self) -> Result<(), PlaybookError> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: A canned opponent behind the loopback
// ─────────────────────────────────────────────────────────────────────

/// Encode the server's board as a `STATE` frame.
fn state_frame(cells: &[String]) -> String {
    serde_json::json!({ "cmd": "STATE", "play_book": cells }).to_string()
}

/// Runs the fake server: seats the client as X, echoes every move, and
/// answers with O's canned replies until they run out.
async fn run_server(mut server: LoopbackServer) {
    let mut cells = vec![String::new(); 9];
    // O's answers, one per X move. X's third move wins before a third
    // answer is ever needed.
    let mut answers = [1usize, 2].into_iter();

    while let Some(frame) = server.rx.recv().await {
        tracing::info!("Server received: {frame}");
        if frame == "play" {
            let init = serde_json::json!({
                "cmd": "INIT",
                "client_id": "demo-seat",
                "player": "X",
                "play_book": cells,
            });
            let _ = server.tx.send(init.to_string());
        } else if let Some(rest) = frame.strip_prefix("PLAY:X:") {
            let Ok(cell) = rest.parse::<usize>() else {
                continue;
            };
            if let Some(slot) = cells.get_mut(cell) {
                *slot = "X".to_owned();
            }
            let _ = server.tx.send(state_frame(&cells));

            if let Some(reply) = answers.next() {
                if let Some(slot) = cells.get_mut(reply) {
                    *slot = "O".to_owned();
                }
                let _ = server.tx.send(state_frame(&cells));
            }
        } else if frame.starts_with("LEAVE:") {
            break;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 4: Wire together the client and the fake server
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for readable output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Create the loopback pair and run the canned opponent.
    let (transport, server) = loopback_pair();
    tokio::spawn(run_server(server));

    // Start the client. It immediately sends the join hello through the
    // loopback, and the fake server answers with a seat.
    let config = PlaybookConfig::new("ws://loopback.invalid/game");
    let (mut client, mut event_rx) = PlaybookClient::start(transport, config);

    // X's moves: center, then two corners. The third completes the
    // 0-4-8 diagonal.
    let mut moves = [4usize, 0, 8].into_iter();

    // ── Drive the match from the event stream ───────────────────────
    while let Some(event) = event_rx.recv().await {
        match event {
            GameEvent::Joined { client_id, player } => {
                tracing::info!("Seated as {player} (seat token: {client_id})");
            }
            GameEvent::BoardUpdated { board, win_line } => {
                println!("\n{board}\n");
                if let Some(line) = win_line {
                    tracing::info!("Winning line: {line:?}");
                }
            }
            GameEvent::StatusChanged(status) => {
                tracing::info!("{status}");
                match status {
                    // Our turn: play the next scripted move.
                    GameStatus::Turn {
                        current,
                        you: Some(me),
                    } if current == me => {
                        if let Some(cell) = moves.next() {
                            client.play(cell)?;
                        }
                    }
                    GameStatus::Won { .. } | GameStatus::Draw => break,
                    _ => {}
                }
            }
            GameEvent::Disconnected { reason } => {
                tracing::info!("Disconnected: {}", reason.as_deref().unwrap_or("clean"));
                break;
            }
            other => {
                tracing::debug!("Event: {other:?}");
            }
        }
    }

    // ── Clean shutdown ──────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Done. The whole match ran in-process!");
    Ok(())
}
