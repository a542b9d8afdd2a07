//! Transport abstraction for the Wordcraft lobby protocol.
//!
//! The [`Transport`] trait is the client's view of the persistent lobby
//! connection: an ordered, bidirectional channel of JSON text messages, one
//! envelope per message. The event loop relies on the transport preserving
//! server-send order; there is no client-side reordering buffer.
//!
//! # Connection Setup
//!
//! Opening the connection is NOT part of this trait. Build the URL with
//! [`ReconnectionCoordinator::connection_url`](crate::reconnect::ReconnectionCoordinator::connection_url)
//! (which appends the stored reconnection credential), connect a transport,
//! then hand it to [`LobbyClient::start`](crate::client::LobbyClient::start).
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use tokio::sync::mpsc;
//! use wordcraft_client::error::WordcraftError;
//! use wordcraft_client::transport::Transport;
//!
//! struct ChannelTransport {
//!     tx: mpsc::UnboundedSender<String>,
//!     rx: mpsc::UnboundedReceiver<String>,
//! }
//!
//! #[async_trait]
//! impl Transport for ChannelTransport {
//!     async fn send(&mut self, message: String) -> Result<(), WordcraftError> {
//!         self.tx
//!             .send(message)
//!             .map_err(|e| WordcraftError::TransportSend(e.to_string()))
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, WordcraftError>> {
//!         self.rx.recv().await.map(Ok)
//!     }
//!
//!     async fn close(&mut self) -> Result<(), WordcraftError> {
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::WordcraftError;

/// A bidirectional text message transport carrying lobby envelopes.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON
/// envelope; each call to [`recv`](Transport::recv) returns one.
///
/// # Object Safety
///
/// This trait is object-safe, so `Box<dyn Transport>` works for dynamic
/// dispatch.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is
/// polled inside `tokio::select!`. If `recv` is cancelled before completion,
/// calling it again must not lose data.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`WordcraftError::TransportSend`] if the message could not be
    /// sent.
    async fn send(&mut self, message: String) -> Result<(), WordcraftError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete message was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the connection was closed by the server
    async fn recv(&mut self) -> Option<Result<String, WordcraftError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Implementations should
    /// still release resources in that case.
    async fn close(&mut self) -> Result<(), WordcraftError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&mut self, message: String) -> Result<(), WordcraftError> {
        (**self).send(message).await
    }

    async fn recv(&mut self) -> Option<Result<String, WordcraftError>> {
        (**self).recv().await
    }

    async fn close(&mut self) -> Result<(), WordcraftError> {
        (**self).close().await
    }
}
