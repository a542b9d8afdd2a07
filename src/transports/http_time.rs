//! [`TimeSource`] backed by the server's `GET /api/time` endpoint.
//!
//! The endpoint answers with the server's current Unix time in milliseconds
//! as a plain-text decimal body.

use async_trait::async_trait;
use tracing::debug;

use crate::client::LobbyConfig;
use crate::clock::TimeSource;
use crate::error::{Result, WordcraftError};
use crate::protocol::Millis;

/// Path of the time endpoint, relative to the HTTP base URL.
pub const TIME_PATH: &str = "/api/time";

/// Queries `/api/time` over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpTimeSource {
    client: reqwest::Client,
    url: String,
}

impl HttpTimeSource {
    /// Query the endpoint at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// The time endpoint of the server `config` points at.
    pub fn for_config(config: &LobbyConfig) -> Self {
        Self::new(format!("{}{TIME_PATH}", config.http_base_url()))
    }

    /// Share an existing client (connection pool, proxy settings).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TimeSource for HttpTimeSource {
    async fn server_time(&self) -> Result<Millis> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| WordcraftError::TimeSync(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WordcraftError::TimeSync(format!(
                "{} answered {status}",
                self.url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WordcraftError::TimeSync(e.to_string()))?;
        let millis = parse_server_time(&body)?;
        debug!(url = %self.url, millis, "server time received");
        Ok(millis)
    }
}

fn parse_server_time(body: &str) -> Result<Millis> {
    body.trim()
        .parse::<Millis>()
        .map_err(|e| WordcraftError::TimeSync(format!("unexpected time body {body:?}: {e}")))
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
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single HTTP response and return the server's `host:port`.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await.unwrap();
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        addr.to_string()
    }

    #[test]
    fn parses_plain_millis() {
        assert_eq!(parse_server_time("1700000000123").unwrap(), 1_700_000_000_123);
        assert_eq!(parse_server_time(" 42\n").unwrap(), 42);
    }

    #[test]
    fn rejects_non_numeric_body() {
        let err = parse_server_time("{\"now\":1}").unwrap_err();
        assert!(matches!(err, WordcraftError::TimeSync(_)));
    }

    #[test]
    fn url_follows_deployment() {
        let config = LobbyConfig::new(uuid::Uuid::nil())
            .with_host("wordcraft.example.com")
            .with_deployment(Deployment::Production);
        assert_eq!(
            HttpTimeSource::for_config(&config).url(),
            "https://wordcraft.example.com/api/time"
        );
    }

    #[tokio::test]
    async fn reads_time_from_server() {
        let host = serve_once("200 OK", "1700000000000").await;
        let source = HttpTimeSource::new(format!("http://{host}{TIME_PATH}"));
        assert_eq!(source.server_time().await.unwrap(), 1_700_000_000_000);
    }

    #[tokio::test]
    async fn error_status_is_time_sync_error() {
        let host = serve_once("503 Service Unavailable", "").await;
        let source = HttpTimeSource::new(format!("http://{host}{TIME_PATH}"));
        let err = source.server_time().await.unwrap_err();
        assert!(matches!(err, WordcraftError::TimeSync(msg) if msg.contains("503")));
    }
}
