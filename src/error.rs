//! Error types for the board client.

use thiserror::Error;

/// Errors that can occur when using the board client.
#[derive(Debug, Error)]
pub enum PlaybookError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// An inbound frame could not be parsed as a protocol record. Fatal
    /// for the session: the board is never updated from a frame that was
    /// only partially understood.
    #[error("malformed server frame: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires a live session, but the
    /// client is not connected.
    #[error("not connected to server")]
    NotConnected,

    /// The configured board URL cannot be mapped to a connection URL
    /// (unsupported or missing scheme).
    #[error("invalid board url: {0}")]
    InvalidUrl(String),

    /// A cell index outside the 9-slot board was requested.
    #[error("cell index {index} is outside the board (0-8)")]
    CellOutOfRange {
        /// The offending index.
        index: usize,
    },

    /// An operation timed out (connection handshake, graceful shutdown).
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred while connecting.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for board client operations.
pub type Result<T> = std::result::Result<T, PlaybookError>;
