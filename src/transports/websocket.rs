//! Lobby connection over a WebSocket, using `tokio-tungstenite`.
//!
//! Each Wordcraft event travels as one text frame. Ping/pong is answered by
//! tungstenite itself; binary frames are never sent by the server and are
//! skipped.
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), wordcraft_client::WordcraftError> {
//! use std::sync::Arc;
//! use wordcraft_client::{LobbyConfig, ReconnectionCoordinator, WebSocketTransport};
//!
//! let config = LobbyConfig::new(uuid::Uuid::new_v4());
//! let coordinator = Arc::new(ReconnectionCoordinator::in_memory());
//! let transport = WebSocketTransport::connect_to_lobby(&coordinator, &config).await?;
//! # drop(transport);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::client::LobbyConfig;
use crate::error::WordcraftError;
use crate::reconnect::ReconnectionCoordinator;
use crate::transport::Transport;

/// The underlying stream type, exposed for [`WebSocketTransport::from_stream`].
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// [`Transport`] over a WebSocket connection (`ws://` or `wss://`).
///
/// [`recv`](Transport::recv) is cancel-safe, so it can sit in a
/// `tokio::select!` next to other branches.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`WordcraftError::Io`] if the URL is invalid or the handshake
    /// fails. I/O error kinds are kept; everything else maps to
    /// [`ErrorKind::Other`](std::io::ErrorKind::Other).
    pub async fn connect(url: &str) -> Result<Self, WordcraftError> {
        debug!(%url, "connecting to lobby");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            WordcraftError::Io(std::io::Error::new(kind, e))
        })?;

        info!(%url, "lobby connection established");
        Ok(Self::from_stream(stream))
    }

    /// Like [`connect`](Self::connect), failing with
    /// [`WordcraftError::Timeout`] after `timeout`.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub async fn connect_with_timeout(
        url: &str,
        timeout: Duration,
    ) -> Result<Self, WordcraftError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| WordcraftError::Timeout)?
    }

    /// Connect to the lobby named by `config`, presenting the stored
    /// reconnection credential when the coordinator has one.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub async fn connect_to_lobby(
        coordinator: &ReconnectionCoordinator,
        config: &LobbyConfig,
    ) -> Result<Self, WordcraftError> {
        let url = coordinator.connection_url(config);
        // The URL may carry the credential; log only the lobby.
        debug!(
            lobby = %config.lobby_id,
            resuming = coordinator.credential().is_some(),
            "opening lobby socket"
        );
        Self::connect(&url).await
    }

    /// Wrap a stream set up elsewhere (custom TLS, proxies, headers).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), WordcraftError> {
        if self.closed {
            return Err(WordcraftError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| WordcraftError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, WordcraftError>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(WordcraftError::TransportReceive(e.to_string()))),
            };

            match frame {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(close) => {
                    debug!(?close, "lobby socket closed by server");
                    return None;
                }
                Message::Binary(bytes) => {
                    warn!(len = bytes.len(), "skipping binary frame");
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), WordcraftError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| WordcraftError::TransportSend(e.to_string()))
    }
}

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
    use crate::client::Deployment;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Accept one WebSocket connection on an ephemeral port and hand it to
    /// `handler`. Returns the bound address and the request path the client
    /// asked for.
    async fn serve_once<F, Fut>(handler: F) -> (String, oneshot::Receiver<String>)
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (path_tx, path_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let record_path =
                move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    let _ = path_tx.send(req.uri().to_string());
                    Ok(resp)
                };
            let ws = tokio_tungstenite::accept_hdr_async(tcp, record_path)
                .await
                .unwrap();
            handler(ws).await;
        });

        (addr.to_string(), path_rx)
    }

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn invalid_url_is_io_error() {
        let err = WebSocketTransport::connect("not-a-valid-url").await.unwrap_err();
        assert!(matches!(err, WordcraftError::Io(_)));
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        // TEST-NET-1 is not routable.
        let err = WebSocketTransport::connect_with_timeout(
            "ws://192.0.2.1:1/ws/lobby",
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WordcraftError::Timeout));
    }

    #[tokio::test]
    async fn receives_lobby_events_and_skips_binary() {
        let (host, _path) = serve_once(|mut ws| async move {
            ws.send(Message::Binary(vec![1, 2, 3].into())).await.unwrap();
            ws.send(Message::Text(r#"{"Type":"restart_game"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&format!("ws://{host}/ws/x"))
            .await
            .unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"Type":"restart_game"}"#
        );
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn connect_to_lobby_presents_credential() {
        let (host, path) = serve_once(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let lobby_id = uuid::Uuid::nil();
        let config = LobbyConfig::new(lobby_id)
            .with_host(host)
            .with_deployment(Deployment::Development);
        let coordinator = ReconnectionCoordinator::in_memory();
        coordinator.on_snapshot("c0ffee");

        let mut transport = WebSocketTransport::connect_to_lobby(&coordinator, &config)
            .await
            .unwrap();
        assert_eq!(
            path.await.unwrap(),
            format!("/ws/{lobby_id}?reconnectToken=c0ffee")
        );
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn outbound_frames_reach_the_server() {
        let (seen_tx, seen_rx) = oneshot::channel();
        let (host, _path) = serve_once(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = seen_tx.send(text.to_string());
            }
        })
        .await;

        let mut transport = WebSocketTransport::connect(&format!("ws://{host}/ws/x"))
            .await
            .unwrap();
        transport
            .send(r#"{"Type":"start_game"}"#.to_string())
            .await
            .unwrap();
        assert_eq!(seen_rx.await.unwrap(), r#"{"Type":"start_game"}"#);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_sends() {
        let (host, _path) = serve_once(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let mut transport = WebSocketTransport::connect(&format!("ws://{host}/ws/x"))
            .await
            .unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, WordcraftError::TransportClosed));
    }
}
