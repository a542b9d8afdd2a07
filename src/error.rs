//! Error types for the Wordcraft client.

use thiserror::Error;

/// Errors that can occur when using the Wordcraft client.
#[derive(Debug, Error)]
pub enum WordcraftError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol envelope.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The envelope named a known message type but its `Content` did not
    /// match the payload shape for that type.
    #[error("malformed `{kind}` payload: {source}")]
    MalformedPayload {
        /// The `Type` field of the offending envelope.
        kind: String,
        /// The underlying decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// Attempted an operation that requires an active connection, but the
    /// event loop has exited.
    #[error("not connected to lobby")]
    NotConnected,

    /// A display name was rejected before being sent to the server.
    #[error("invalid display name ({len} characters, expected 1..={max})")]
    InvalidDisplayName {
        /// Length of the rejected name in characters.
        len: usize,
        /// Longest name the server accepts.
        max: usize,
    },

    /// The time-sync endpoint could not be queried or returned garbage.
    #[error("time sync failed: {0}")]
    TimeSync(String),

    /// The lobby HTTP API refused or garbled a request.
    #[error("lobby API error: {0}")]
    LobbyApi(String),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Wordcraft client operations.
pub type Result<T> = std::result::Result<T, WordcraftError>;
