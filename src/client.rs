//! Async client for the board protocol.
//!
//! [`PlaybookClient`] is a thin handle that communicates with a background
//! transport loop task via an unbounded MPSC channel. Events are emitted on
//! a bounded channel ([`tokio::sync::mpsc::Receiver<GameEvent>`]) returned
//! from [`PlaybookClient::start`] or [`PlaybookClient::connect`].
//!
//! The loop owns the [`GameSession`] dispatcher. Handle methods only queue
//! requests; every board mutation, optimistic or authoritative, happens on
//! the loop task, so there is exactly one writer and the event order seen
//! by the consumer is the order the session produced.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = PlaybookConfig::new("wss://play.example/board/42");
//! let (client, mut events) = PlaybookClient::connect(config).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         GameEvent::StatusChanged(status) => println!("{status}"),
//!         GameEvent::BoardUpdated { board, .. } => println!("{board}"),
//!         GameEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::board::{Board, Player};
use crate::error::{PlaybookError, Result};
use crate::event::{GameEvent, GameStatus};
use crate::protocol::{ClientCommand, ServerCommand};
use crate::session::{GameSession, SessionPhase};
use crate::transport::Transport;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default timeout for the connection handshake.
const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(5);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`PlaybookClient`] connection.
///
/// The only required field is `board_url`; all others have sensible
/// defaults.
///
/// # Example
///
/// ```
/// use playbook_client::client::PlaybookConfig;
///
/// let config = PlaybookConfig::new("wss://play.example/board/42");
/// assert_eq!(config.board_url, "wss://play.example/board/42");
/// assert!(config.client_id.is_none());
/// ```
///
/// # Tuning
///
/// ```
/// use playbook_client::client::PlaybookConfig;
/// use std::time::Duration;
///
/// let config = PlaybookConfig::new("wss://play.example/board/42")
///     .with_event_channel_capacity(512)
///     .with_open_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct PlaybookConfig {
    /// URL of the board to join. `http(s)` URLs are accepted and mapped
    /// to the matching WebSocket scheme.
    pub board_url: String,
    /// Seat token from an earlier session's `Joined` event. When set,
    /// the server is asked to reattach this client to that seat instead
    /// of issuing a fresh one.
    pub client_id: Option<String>,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up with incoming server pushes,
    /// events are dropped (with a warning logged) to avoid blocking the
    /// transport loop. The `Disconnected` event is always delivered
    /// regardless of capacity.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`PlaybookClient::shutdown`] is called, the background
    /// transport loop is given this much time to send the goodbye frame,
    /// close the transport, and emit a final `Disconnected` event. If
    /// the timeout expires the task is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Timeout for the connection handshake in
    /// [`PlaybookClient::connect`].
    ///
    /// The handshake completing is the moment the connection counts as
    /// open; if it takes longer than this, `connect` fails with
    /// [`PlaybookError::Timeout`].
    ///
    /// Defaults to **5 seconds**.
    pub open_timeout: Duration,
}

impl PlaybookConfig {
    /// Create a new configuration with the given board URL and default
    /// values.
    pub fn new(board_url: impl Into<String>) -> Self {
        Self {
            board_url: board_url.into(),
            client_id: None,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
        }
    }

    /// Set the seat token to resume after a dropped connection.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    ///
    /// Defaults to **1 second**. A zero timeout aborts the transport
    /// loop immediately without waiting for graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the timeout for the connection handshake.
    ///
    /// Defaults to **5 seconds**.
    #[must_use]
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// The WebSocket URL this configuration dials.
    ///
    /// `http`/`https` map to `ws`/`wss`; `ws` and `wss` pass through. A
    /// seat token, when present, is appended as a `client_id` query
    /// parameter.
    ///
    /// # Example
    ///
    /// ```
    /// use playbook_client::client::PlaybookConfig;
    ///
    /// # fn main() -> Result<(), playbook_client::PlaybookError> {
    /// let config = PlaybookConfig::new("https://play.example/board/7")
    ///     .with_client_id("tok-1");
    /// assert_eq!(
    ///     config.websocket_url()?,
    ///     "wss://play.example/board/7?client_id=tok-1",
    /// );
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::InvalidUrl`] when `board_url` has no
    /// scheme or a scheme that cannot carry a WebSocket.
    pub fn websocket_url(&self) -> Result<String> {
        let (scheme, rest) = self
            .board_url
            .split_once("://")
            .ok_or_else(|| PlaybookError::InvalidUrl(self.board_url.clone()))?;
        let ws_scheme = match scheme {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            _ => return Err(PlaybookError::InvalidUrl(self.board_url.clone())),
        };
        let mut url = format!("{ws_scheme}://{rest}");
        if let Some(client_id) = &self.client_id {
            url.push(if rest.contains('?') { '&' } else { '?' });
            url.push_str("client_id=");
            url.push_str(client_id);
        }
        Ok(url)
    }
}

// ── Requests ────────────────────────────────────────────────────────

/// Requests queued from the handle to the transport loop. The session
/// on the loop task decides whether each one becomes a wire frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Join,
    Play { cell: usize },
    Reset,
    Leave,
}

// ── Shared state ────────────────────────────────────────────────────

/// Internal shared state between the client handle and the transport
/// loop. A read-only mirror of the loop's session, refreshed after
/// every session mutation.
struct ClientState {
    connected: AtomicBool,
    game_active: AtomicBool,
    board: Mutex<Board>,
    client_id: Mutex<Option<String>>,
    local_player: Mutex<Option<Player>>,
    phase: Mutex<SessionPhase>,
}

impl ClientState {
    fn new(client_id: Option<String>) -> Self {
        Self {
            connected: AtomicBool::new(true),
            game_active: AtomicBool::new(false),
            board: Mutex::new(Board::empty()),
            client_id: Mutex::new(client_id),
            local_player: Mutex::new(None),
            phase: Mutex::new(SessionPhase::Uninitialized),
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for a shared tic-tac-toe board.
///
/// Created via [`PlaybookClient::start`] (any [`Transport`]) or
/// [`PlaybookClient::connect`] (WebSocket), both of which spawn a
/// background transport loop and return this handle together with an
/// event receiver.
///
/// All public methods queue a request to the transport loop and return
/// immediately once it is queued (no round-trip await). Whether a
/// request actually goes out on the wire is decided by the session on
/// the loop task; an ignored request (cell taken, not your turn, no
/// seat yet) produces no frame and no event.
pub struct PlaybookClient {
    /// Sender half of the request channel to the transport loop.
    req_tx: mpsc::UnboundedSender<Request>,
    /// Shared state updated by the transport loop.
    state: Arc<ClientState>,
    /// Handle to the background transport loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the transport loop to shut down gracefully.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
}

impl PlaybookClient {
    /// Start the client transport loop and return a handle plus event
    /// receiver.
    ///
    /// The transport loop immediately sends the join hello so the server
    /// seats this connection. When `config.client_id` is set, the
    /// session starts in resumption mode and the server's `INIT` decides
    /// whether the old seat is still available.
    ///
    /// # Arguments
    ///
    /// * `transport` — A connected [`Transport`] implementation.
    /// * `config` — Client configuration including the board URL.
    ///
    /// # Returns
    ///
    /// A tuple of `(client_handle, event_receiver)`. The event receiver
    /// yields [`GameEvent`]s until the transport closes or the client
    /// shuts down; [`GameEvent::Disconnected`] is always the last one.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: PlaybookConfig,
    ) -> (Self, mpsc::Receiver<GameEvent>) {
        let (req_tx, req_rx) = mpsc::unbounded_channel::<Request>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<GameEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let state = Arc::new(ClientState::new(config.client_id.clone()));
        let loop_state = Arc::clone(&state);

        let session = match config.client_id {
            Some(client_id) => GameSession::resuming(client_id),
            None => GameSession::new(),
        };

        // Queue the join hello so the transport loop picks it up as the
        // very first outgoing frame. Cannot fail: the channel was just
        // created.
        let _ = req_tx.send(Request::Join);

        let task = tokio::spawn(transport_loop(
            transport,
            req_rx,
            event_tx,
            loop_state,
            session,
            shutdown_rx,
        ));

        let client = Self {
            req_tx,
            state,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    /// Connect to the board over WebSocket and start the client.
    ///
    /// Dials [`PlaybookConfig::websocket_url`], waits at most
    /// [`open_timeout`](PlaybookConfig::open_timeout) for the handshake
    /// to complete, then hands the open connection to
    /// [`start`](Self::start).
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # async fn run() -> Result<(), playbook_client::PlaybookError> {
    /// use playbook_client::{PlaybookClient, PlaybookConfig};
    ///
    /// let config = PlaybookConfig::new("wss://play.example/board/42");
    /// let (client, mut events) = PlaybookClient::connect(config).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::InvalidUrl`] for an unusable board URL,
    /// [`PlaybookError::Timeout`] when the handshake does not complete
    /// in time, or [`PlaybookError::Io`] when the connection fails.
    #[cfg(feature = "transport-websocket")]
    pub async fn connect(config: PlaybookConfig) -> Result<(Self, mpsc::Receiver<GameEvent>)> {
        let url = config.websocket_url()?;
        let transport = crate::transports::WebSocketTransport::connect_with_timeout(
            &url,
            config.open_timeout,
        )
        .await?;
        Ok(Self::start(transport, config))
    }

    // ── Public API methods ──────────────────────────────────────────

    /// Claim a cell on the board, 0-8 row-major.
    ///
    /// The move is checked against the local session first (your seat,
    /// your turn, cell empty); an illegal move is dropped without a
    /// frame or an event. A legal move marks the cell optimistically,
    /// suspends further moves until the server answers, and sends the
    /// `PLAY` frame. The server's next snapshot remains authoritative
    /// either way.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::CellOutOfRange`] for indices past the
    /// grid and [`PlaybookError::NotConnected`] if the transport has
    /// closed.
    pub fn play(&self, cell: usize) -> Result<()> {
        if cell >= Board::SLOTS {
            return Err(PlaybookError::CellOutOfRange { index: cell });
        }
        self.send(Request::Play { cell })
    }

    /// Ask the server to clear the board.
    ///
    /// No event fires until the server pushes the `RESET` back; a reset
    /// this client asked for is then applied silently, without the
    /// peer-reset notice. Ignored when no seat is held or the board was
    /// declared complete.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::NotConnected`] if the transport has
    /// closed.
    pub fn request_reset(&self) -> Result<()> {
        self.send(Request::Reset)
    }

    /// Leave the board voluntarily.
    ///
    /// Sends the goodbye frame and seals the session: every later
    /// request and every later server push is ignored. The connection
    /// itself stays open until [`shutdown`](Self::shutdown) or the
    /// server closes it.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybookError::NotConnected`] if the transport has
    /// closed.
    pub fn leave(&self) -> Result<()> {
        self.send(Request::Leave)
    }

    /// Shut down the client, closing the transport and stopping the
    /// background task.
    ///
    /// A seated session sends its goodbye frame before the socket
    /// closes, so the peer learns about the departure. After this
    /// method returns the event receiver yields any remaining events
    /// and then `None`.
    pub async fn shutdown(&mut self) {
        debug!("PlaybookClient: shutdown requested");

        // Signal the transport loop to shut down gracefully.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the transport loop with a timeout. If it doesn't exit in
        // time, abort it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` if the transport is believed to be connected.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    /// Returns `true` if it is this client's turn on a live board.
    pub fn is_game_active(&self) -> bool {
        self.state.game_active.load(Ordering::Acquire)
    }

    /// Returns the current board snapshot.
    pub async fn board(&self) -> Board {
        *self.state.board.lock().await
    }

    /// Returns the seat token, once the server has issued one (or the
    /// resumption token passed in via the config, until the server
    /// replaces it).
    pub async fn client_id(&self) -> Option<String> {
        self.state.client_id.lock().await.clone()
    }

    /// Returns the symbol this client controls, once seated.
    pub async fn local_player(&self) -> Option<Player> {
        *self.state.local_player.lock().await
    }

    /// Returns the session's lifecycle stage.
    pub async fn phase(&self) -> SessionPhase {
        *self.state.phase.lock().await
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Queue a request to the transport loop.
    fn send(&self, request: Request) -> Result<()> {
        if !self.state.connected.load(Ordering::Acquire) {
            return Err(PlaybookError::NotConnected);
        }
        self.req_tx
            .send(request)
            .map_err(|_| PlaybookError::NotConnected)
    }
}

impl std::fmt::Debug for PlaybookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybookClient")
            .field("connected", &self.is_connected())
            .field("game_active", &self.is_game_active())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for PlaybookClient {
    fn drop(&mut self) {
        // `Drop` is synchronous, so the graceful path (goodbye frame,
        // transport close) cannot run here: both need an executor to
        // drive them. Aborting the task is the only safe action; the
        // shutdown oneshot is intentionally not fired.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Background transport loop that multiplexes send/receive via
/// `tokio::select!`.
///
/// Exits when:
/// - The request channel closes (client handle dropped) or shutdown is
///   signalled
/// - The transport returns `None` (server closed the connection)
/// - A transport error occurs
/// - An inbound frame cannot be parsed (the board mirror can no longer
///   be trusted, so the session ends)
async fn transport_loop(
    mut transport: impl Transport,
    mut req_rx: mpsc::UnboundedReceiver<Request>,
    event_tx: mpsc::Sender<GameEvent>,
    state: Arc<ClientState>,
    mut session: GameSession,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    debug!("transport loop started");

    // Synthetic events before the select loop: the link is up, and the
    // status line reads Initializing until the server seats us.
    emit_event(&event_tx, GameEvent::Connected).await;
    emit_event(&event_tx, GameEvent::StatusChanged(GameStatus::Initializing)).await;

    loop {
        tokio::select! {
            // Branch 1: request from the client handle
            request = req_rx.recv() => {
                match request {
                    Some(request) => {
                        let frame = handle_request(&mut session, request, &event_tx).await;
                        sync_shared(&state, &session).await;
                        if let Some(frame) = frame {
                            debug!(frame = %frame, "sending frame");
                            if let Err(e) = transport.send(frame).await {
                                error!("transport send error: {e}");
                                emit_disconnected(
                                    &event_tx,
                                    &state,
                                    Some(format!("transport send error: {e}")),
                                ).await;
                                break;
                            }
                        }
                    }
                    // Request channel closed — client handle dropped.
                    None => {
                        debug!("request channel closed, shutting down transport loop");
                        send_departure(&mut transport, &mut session, &state).await;
                        let _ = transport.close().await;
                        emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                        break;
                    }
                }
            }

            // Branch 2: shutdown signal
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                send_departure(&mut transport, &mut session, &state).await;
                let _ = transport.close().await;
                emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                break;
            }

            // Branch 3: incoming frame from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match serde_json::from_str::<ServerCommand>(&text) {
                            Ok(command) => {
                                debug!(
                                    "received server command: {:?}",
                                    std::mem::discriminant(&command)
                                );
                                let events = session.apply(command);
                                sync_shared(&state, &session).await;
                                for event in events {
                                    emit_event(&event_tx, event).await;
                                }
                            }
                            Err(e) => {
                                // An unreadable frame means the board
                                // mirror can no longer be trusted. End
                                // the session instead of guessing.
                                let detail = PlaybookError::from(e).to_string();
                                error!("{detail}; raw frame: {text}");
                                emit_event(
                                    &event_tx,
                                    GameEvent::ProtocolError { detail: detail.clone() },
                                ).await;
                                let _ = transport.close().await;
                                emit_disconnected(&event_tx, &state, Some(detail)).await;
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        emit_disconnected(
                            &event_tx,
                            &state,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    // Transport closed cleanly.
                    None => {
                        debug!("transport closed by server");
                        emit_disconnected(&event_tx, &state, None).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("transport loop exited");
}

/// Translate one handle request into session events plus the frame to
/// transmit, if any. A request the session rejects produces neither.
async fn handle_request(
    session: &mut GameSession,
    request: Request,
    event_tx: &mpsc::Sender<GameEvent>,
) -> Option<String> {
    match request {
        Request::Join => Some(ClientCommand::Join.to_frame()),
        Request::Play { cell } => {
            let (command, events) = session.play_local(cell)?;
            for event in events {
                emit_event(event_tx, event).await;
            }
            Some(command.to_frame())
        }
        Request::Reset => session.begin_reset().map(|command| command.to_frame()),
        Request::Leave => session.leave().map(|command| command.to_frame()),
    }
}

/// Copy the session's renderer-relevant fields into the shared mirror
/// so the handle accessors stay in step with the event stream.
async fn sync_shared(state: &ClientState, session: &GameSession) {
    state
        .game_active
        .store(session.game_active(), Ordering::Release);
    *state.board.lock().await = session.board();
    *state.client_id.lock().await = session.client_id().map(str::to_owned);
    *state.local_player.lock().await = session.local_player();
    *state.phase.lock().await = session.phase();
}

/// Best-effort goodbye frame for a seated session before the socket
/// closes. A failure is logged and otherwise ignored; the connection is
/// coming down either way.
async fn send_departure(
    transport: &mut impl Transport,
    session: &mut GameSession,
    state: &ClientState,
) {
    if let Some(command) = session.leave() {
        if let Err(e) = transport.send(command.to_frame()).await {
            debug!("goodbye frame not sent: {e}");
        }
    }
    sync_shared(state, session).await;
}

/// Emit an event to the event channel. If the channel is full, log a
/// warning and drop the event to avoid blocking the transport loop.
async fn emit_event(event_tx: &mpsc::Sender<GameEvent>, event: GameEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit a [`Disconnected`](GameEvent::Disconnected) event and update
/// state.
///
/// Uses `send().await` (blocking) instead of `try_send` because
/// `Disconnected` is always the last event on the channel and must
/// never be silently dropped.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<GameEvent>,
    state: &ClientState,
    reason: Option<String>,
) {
    state.connected.store(false, Ordering::Release);
    state.game_active.store(false, Ordering::Release);
    let event = GameEvent::Disconnected { reason };
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::board::Cell;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// A mock transport that records sent frames and replays scripted
    /// responses.
    struct MockTransport {
        /// Frames that `recv()` will yield in order.
        incoming: VecDeque<Option<std::result::Result<String, PlaybookError>>>,
        /// Recorded outgoing frames.
        sent: Arc<StdMutex<Vec<String>>>,
        /// Whether `close()` was called.
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, PlaybookError>>>,
        ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            };
            (transport, sent, closed)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, frame: String) -> std::result::Result<(), PlaybookError> {
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, PlaybookError>> {
            if let Some(item) = self.incoming.pop_front() {
                // An explicit `None` entry signals a clean transport
                // close; `Some(result)` delivers the scripted frame or
                // error.
                item
            } else {
                // All scripted frames have been delivered; hang forever
                // so the transport loop stays alive until shutdown.
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), PlaybookError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    /// Builds a board from nine glyphs: `X`, `O`, or `.` for empty.
    fn snapshot(pattern: &str) -> Board {
        let mut cells = [Cell::Empty; 9];
        for (index, glyph) in pattern.chars().enumerate() {
            cells[index] = match glyph {
                'X' => Cell::Taken(Player::X),
                'O' => Cell::Taken(Player::O),
                '.' => Cell::Empty,
                other => panic!("unexpected glyph {other:?}"),
            };
        }
        Board::from(cells)
    }

    fn init_json(player: Player) -> String {
        serde_json::to_string(&ServerCommand::Init {
            client_id: "seat-1".to_owned(),
            player,
            play_book: Board::empty(),
        })
        .unwrap()
    }

    fn state_json(pattern: &str) -> String {
        serde_json::to_string(&ServerCommand::State {
            play_book: snapshot(pattern),
        })
        .unwrap()
    }

    /// Consume the two synthetic start-of-stream events plus the three
    /// seating events, leaving the client fully seated.
    async fn drain_until_seated(events: &mut mpsc::Receiver<GameEvent>) {
        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, GameEvent::Connected), "got {ev:?}");
        let ev = events.recv().await.unwrap();
        assert_eq!(ev, GameEvent::StatusChanged(GameStatus::Initializing));
        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, GameEvent::Joined { .. }), "got {ev:?}");
        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, GameEvent::BoardUpdated { .. }), "got {ev:?}");
        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, GameEvent::StatusChanged(_)), "got {ev:?}");
    }

    // ── Config tests ────────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let config = PlaybookConfig::new("wss://play.example/board/1");
        assert_eq!(config.board_url, "wss://play.example/board/1");
        assert!(config.client_id.is_none());
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.open_timeout, Duration::from_secs(5));
    }

    #[test]
    fn config_builder_methods() {
        let config = PlaybookConfig::new("wss://play.example/board/1")
            .with_client_id("tok-7")
            .with_event_channel_capacity(512)
            .with_shutdown_timeout(Duration::from_secs(5))
            .with_open_timeout(Duration::from_secs(30));
        assert_eq!(config.client_id.as_deref(), Some("tok-7"));
        assert_eq!(config.event_channel_capacity, 512);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.open_timeout, Duration::from_secs(30));
    }

    #[test]
    fn event_channel_capacity_is_clamped_to_one() {
        let config = PlaybookConfig::new("ws://x").with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[test]
    fn websocket_url_maps_http_schemes() {
        let ws = PlaybookConfig::new("http://play.example/board/1");
        assert_eq!(ws.websocket_url().unwrap(), "ws://play.example/board/1");
        let wss = PlaybookConfig::new("https://play.example/board/1");
        assert_eq!(wss.websocket_url().unwrap(), "wss://play.example/board/1");
    }

    #[test]
    fn websocket_url_keeps_ws_schemes() {
        let ws = PlaybookConfig::new("ws://play.example/board/1");
        assert_eq!(ws.websocket_url().unwrap(), "ws://play.example/board/1");
        let wss = PlaybookConfig::new("wss://play.example/board/1");
        assert_eq!(wss.websocket_url().unwrap(), "wss://play.example/board/1");
    }

    #[test]
    fn websocket_url_appends_the_seat_token() {
        let config = PlaybookConfig::new("ws://play.example/board/1").with_client_id("tok-9");
        assert_eq!(
            config.websocket_url().unwrap(),
            "ws://play.example/board/1?client_id=tok-9"
        );
    }

    #[test]
    fn websocket_url_extends_an_existing_query() {
        let config =
            PlaybookConfig::new("ws://play.example/board/1?lang=en").with_client_id("tok-9");
        assert_eq!(
            config.websocket_url().unwrap(),
            "ws://play.example/board/1?lang=en&client_id=tok-9"
        );
    }

    #[test]
    fn websocket_url_rejects_unusable_urls() {
        for url in ["ftp://play.example/board/1", "play.example/board/1"] {
            let result = PlaybookConfig::new(url).websocket_url();
            assert!(
                matches!(result, Err(PlaybookError::InvalidUrl(_))),
                "{url} should be rejected, got {result:?}"
            );
        }
    }

    // ── Handle and loop tests ───────────────────────────────────────

    #[tokio::test]
    async fn connected_then_initializing_open_the_event_stream() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        let first = events.recv().await.unwrap();
        assert!(matches!(first, GameEvent::Connected), "got {first:?}");
        let second = events.recv().await.unwrap();
        assert_eq!(second, GameEvent::StatusChanged(GameStatus::Initializing));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn join_hello_is_the_first_frame() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        let _ = events.recv().await; // Connected
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let frames = sent.lock().unwrap();
            assert_eq!(frames.first().map(String::as_str), Some("play"));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn seat_assignment_reaches_the_accessors() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(init_json(Player::X)))]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        drain_until_seated(&mut events).await;

        assert_eq!(client.client_id().await.as_deref(), Some("seat-1"));
        assert_eq!(client.local_player().await, Some(Player::X));
        assert_eq!(client.phase().await, SessionPhase::Active);
        assert!(client.is_game_active(), "X opens on an empty board");
        assert_eq!(client.board().await, Board::empty());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn play_sends_the_move_frame() {
        let (transport, sent, _closed) = MockTransport::new(vec![Some(Ok(init_json(Player::X)))]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        drain_until_seated(&mut events).await;
        client.play(4).unwrap();

        // The optimistic redraw arrives before any server answer.
        let ev = events.recv().await.unwrap();
        assert_eq!(
            ev,
            GameEvent::BoardUpdated {
                board: snapshot("....X...."),
                win_line: None,
            }
        );
        assert!(!client.is_game_active(), "one move per server round-trip");

        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let frames = sent.lock().unwrap();
            assert_eq!(frames.as_slice(), ["play", "PLAY:X:4"]);
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn play_out_of_range_fails_fast() {
        let (transport, sent, _closed) = MockTransport::new(vec![Some(Ok(init_json(Player::X)))]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        drain_until_seated(&mut events).await;

        let result = client.play(9);
        assert!(matches!(
            result,
            Err(PlaybookError::CellOutOfRange { index: 9 })
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let frames = sent.lock().unwrap();
            assert_eq!(frames.as_slice(), ["play"], "no move frame may go out");
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn play_without_a_seat_sends_nothing() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Initializing

        // Queuing succeeds; the session on the loop drops the move.
        client.play(0).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let frames = sent.lock().unwrap();
            assert_eq!(frames.as_slice(), ["play"]);
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn reset_request_sends_the_frame() {
        let (transport, sent, _closed) = MockTransport::new(vec![Some(Ok(init_json(Player::O)))]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        drain_until_seated(&mut events).await;
        client.request_reset().unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let frames = sent.lock().unwrap();
            assert_eq!(frames.as_slice(), ["play", "RESET:O"]);
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn leave_seals_the_session() {
        let (transport, sent, _closed) = MockTransport::new(vec![Some(Ok(init_json(Player::X)))]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        drain_until_seated(&mut events).await;
        client.leave().unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.phase().await, SessionPhase::Left);

        // Still connected, but the session ignores further moves.
        client.play(0).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let frames = sent.lock().unwrap();
            assert_eq!(frames.as_slice(), ["play", "LEAVE:X"]);
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_frame_disconnects() {
        let (transport, _sent, closed) =
            MockTransport::new(vec![Some(Ok("definitely not json".to_owned()))]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Initializing

        let ev = events.recv().await.unwrap();
        let detail = match ev {
            GameEvent::ProtocolError { detail } => detail,
            other => panic!("expected ProtocolError, got {other:?}"),
        };
        let ev = events.recv().await.unwrap();
        assert_eq!(
            ev,
            GameEvent::Disconnected {
                reason: Some(detail),
            }
        );

        assert!(!client.is_connected());
        assert!(closed.load(Ordering::Relaxed), "socket must be closed");
        assert!(matches!(client.play(0), Err(PlaybookError::NotConnected)));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn disconnected_on_transport_close() {
        let (transport, _sent, _closed) =
            MockTransport::new(vec![Some(Ok(init_json(Player::X))), None]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        drain_until_seated(&mut events).await;
        let ev = events.recv().await.unwrap();
        assert_eq!(ev, GameEvent::Disconnected { reason: None });
        assert!(!client.is_connected());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn transport_recv_error_emits_disconnected() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Err(
            PlaybookError::TransportReceive("boom".into()),
        ))]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Initializing
        let ev = events.recv().await.unwrap();
        if let GameEvent::Disconnected { reason } = ev {
            assert!(reason.unwrap().contains("boom"));
        } else {
            panic!("expected Disconnected, got {ev:?}");
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn not_connected_error_after_shutdown() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        let _ = events.recv().await; // Connected
        client.shutdown().await;

        assert!(matches!(client.play(0), Err(PlaybookError::NotConnected)));
        assert!(matches!(
            client.request_reset(),
            Err(PlaybookError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn shutdown_sends_goodbye_when_seated() {
        let (transport, sent, closed) = MockTransport::new(vec![Some(Ok(init_json(Player::X)))]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        drain_until_seated(&mut events).await;
        client.shutdown().await;

        {
            let frames = sent.lock().unwrap();
            assert_eq!(frames.as_slice(), ["play", "LEAVE:X"]);
        }
        assert!(closed.load(Ordering::Relaxed));

        let ev = events.recv().await.unwrap();
        assert_eq!(
            ev,
            GameEvent::Disconnected {
                reason: Some("client shut down".into()),
            }
        );
    }

    #[tokio::test]
    async fn shutdown_skips_goodbye_without_a_seat() {
        let (transport, sent, closed) = MockTransport::new(vec![]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Initializing
        tokio::time::sleep(Duration::from_millis(50)).await;

        client.shutdown().await;

        {
            let frames = sent.lock().unwrap();
            assert_eq!(frames.as_slice(), ["play"], "no seat, no goodbye");
        }
        assert!(closed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        let _ = events.recv().await; // Connected

        client.shutdown().await;
        client.shutdown().await; // should not panic
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(init_json(Player::X)))]);
        let (client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        drain_until_seated(&mut events).await;

        // Drop the client without calling shutdown. The loop task is
        // aborted; the event channel closes. Verify we don't hang.
        drop(client);
        while let Some(_event) = events.recv().await {}
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) =
            PlaybookClient::start(transport, PlaybookConfig::new("ws://test"));

        let _ = events.recv().await; // Connected

        let debug_str = format!("{client:?}");
        assert!(debug_str.contains("PlaybookClient"));
        assert!(debug_str.contains("connected"));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn small_event_channel_capacity_drops_intermediate_events() {
        // One-slot channel plus a burst of pushes: intermediate events
        // drop, Connected (first in) and Disconnected (always awaited)
        // survive.
        let mut incoming: Vec<Option<std::result::Result<String, PlaybookError>>> = Vec::new();
        incoming.push(Some(Ok(init_json(Player::X))));
        for _ in 0..10 {
            incoming.push(Some(Ok(state_json("X........"))));
        }
        incoming.push(None);
        let total_possible = 2 + 3 + 10 * 2 + 1;

        let (transport, _sent, _closed) = MockTransport::new(incoming);
        let config = PlaybookConfig::new("ws://test").with_event_channel_capacity(1);
        let (mut client, mut events) = PlaybookClient::start(transport, config);

        // Let the channel fill up and events get dropped.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut count = 0;
        while let Some(_event) = events.recv().await {
            count += 1;
        }
        assert!(count >= 2, "expected at least 2 events, got {count}");
        assert!(
            count < total_possible,
            "expected backpressure to drop some events, but got all {count}"
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn resume_token_prefills_the_accessor() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let config = PlaybookConfig::new("ws://test").with_client_id("tok-old");
        let (mut client, mut events) = PlaybookClient::start(transport, config);

        let _ = events.recv().await; // Connected
        assert_eq!(client.client_id().await.as_deref(), Some("tok-old"));

        client.shutdown().await;
    }

    /// Transport that hangs forever in `close()` so shutdown
    /// timeout/abort can be tested.
    struct HangingCloseTransport {
        close_called: Arc<AtomicBool>,
        dropped: Arc<AtomicBool>,
    }

    impl HangingCloseTransport {
        fn new() -> (Self, Arc<AtomicBool>, Arc<AtomicBool>) {
            let close_called = Arc::new(AtomicBool::new(false));
            let dropped = Arc::new(AtomicBool::new(false));
            (
                Self {
                    close_called: Arc::clone(&close_called),
                    dropped: Arc::clone(&dropped),
                },
                close_called,
                dropped,
            )
        }
    }

    impl Drop for HangingCloseTransport {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::Release);
        }
    }

    #[async_trait]
    impl Transport for HangingCloseTransport {
        async fn send(&mut self, _frame: String) -> std::result::Result<(), PlaybookError> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, PlaybookError>> {
            std::future::pending().await
        }

        async fn close(&mut self) -> std::result::Result<(), PlaybookError> {
            self.close_called.store(true, Ordering::Release);
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn shutdown_timeout_aborts_stuck_transport_task() {
        let (transport, close_called, dropped) = HangingCloseTransport::new();
        let config =
            PlaybookConfig::new("ws://test").with_shutdown_timeout(Duration::from_millis(20));
        let (mut client, mut events) = PlaybookClient::start(transport, config);

        // Drain the synthetic events so the channel stays uncongested.
        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Initializing

        client.shutdown().await;

        assert!(
            close_called.load(Ordering::Acquire),
            "transport.close() should have been attempted during graceful shutdown"
        );
        assert!(
            dropped.load(Ordering::Acquire),
            "timed-out shutdown should abort and drop the transport loop task"
        );
        assert!(!client.is_connected());
    }
}
