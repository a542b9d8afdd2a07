//! Lobby creation over the server's HTTP API.
//!
//! `POST /api/lobby` answers `201 Created` with `{"lobbyId": "<uuid>"}`.

use serde::Deserialize;
use tracing::info;

use crate::client::LobbyConfig;
use crate::error::{Result, WordcraftError};
use crate::protocol::LobbyId;

/// Path of the lobby-creation endpoint, relative to the HTTP base URL.
pub const LOBBY_PATH: &str = "/api/lobby";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedLobby {
    lobby_id: LobbyId,
}

/// Create a new lobby on the server `config` points at.
///
/// The returned id is what [`LobbyConfig::new`] takes to join it.
///
/// # Errors
///
/// [`WordcraftError::LobbyApi`] if the request fails, the server answers with
/// a non-success status, or the body carries no valid `lobbyId`.
pub async fn create_lobby(config: &LobbyConfig) -> Result<LobbyId> {
    create_lobby_with(&reqwest::Client::new(), &config.http_base_url()).await
}

/// Like [`create_lobby`], reusing `client` against an explicit `base_url`
/// such as `http://localhost:8080`.
///
/// # Errors
///
/// See [`create_lobby`].
pub async fn create_lobby_with(client: &reqwest::Client, base_url: &str) -> Result<LobbyId> {
    let url = format!("{base_url}{LOBBY_PATH}");
    let response = client
        .post(&url)
        .send()
        .await
        .map_err(|e| WordcraftError::LobbyApi(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(WordcraftError::LobbyApi(format!("{url} answered {status}")));
    }

    let CreatedLobby { lobby_id } = response
        .json()
        .await
        .map_err(|e| WordcraftError::LobbyApi(format!("unexpected lobby body: {e}")))?;
    info!(%lobby_id, "lobby created");
    Ok(lobby_id)
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
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one JSON response; yields the base URL and the request line.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let n = socket.read(&mut request).await.unwrap();
            let head = String::from_utf8_lossy(&request[..n]);
            let _ = seen_tx.send(head.lines().next().unwrap_or_default().to_string());
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        (format!("http://{addr}"), seen_rx)
    }

    #[tokio::test]
    async fn created_lobby_id_is_returned() {
        let (base, seen) = serve_once(
            "201 Created",
            r#"{"lobbyId":"67e55044-10b1-426f-9247-bb680e5fe0c8"}"#,
        )
        .await;
        let id = create_lobby_with(&reqwest::Client::new(), &base).await.unwrap();
        assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert_eq!(seen.await.unwrap(), "POST /api/lobby HTTP/1.1");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let (base, _seen) = serve_once("500 Internal Server Error", "").await;
        let err = create_lobby_with(&reqwest::Client::new(), &base)
            .await
            .unwrap_err();
        assert!(matches!(err, WordcraftError::LobbyApi(msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn body_without_lobby_id_is_rejected() {
        let (base, _seen) = serve_once("201 Created", r#"{"message":"full"}"#).await;
        let err = create_lobby_with(&reqwest::Client::new(), &base)
            .await
            .unwrap_err();
        assert!(matches!(err, WordcraftError::LobbyApi(_)));
    }
}
