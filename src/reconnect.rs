//! Reconnection credential lifecycle and connection generations.
//!
//! The server hands every client an opaque reconnection credential inside
//! each `client_details` snapshot. Presenting it on the next connection
//! (as a query parameter) resumes the same participant identity instead of
//! allocating a new one.
//!
//! [`ReconnectionCoordinator`] outlives individual connections: create one per
//! lobby, wrap it in an [`Arc`](std::sync::Arc) and pass it to every
//! [`LobbyClient::start`](crate::client::LobbyClient::start). It does not
//! reconnect by itself; when a connection is lost the client reports
//! [`DisconnectReason::ConnectionLost`](crate::event::DisconnectReason::ConnectionLost)
//! and the caller opens a new transport to
//! [`connection_url`](ReconnectionCoordinator::connection_url).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use crate::client::LobbyConfig;

/// Name of the query parameter carrying the reconnection credential.
pub const RECONNECT_TOKEN_PARAM: &str = "reconnectToken";

/// Monotonic counter identifying one connection attempt.
///
/// Anything started on behalf of a connection (clock probes, countdown ticks)
/// is tagged with its generation, so results that arrive after a newer
/// connection began can be recognized and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Persistence for the reconnection credential.
///
/// Implementations decide where the token lives (memory, a file, browser
/// storage). The coordinator is the only caller.
pub trait CredentialStore: Send + Sync + 'static {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str);
    fn clear(&self);
}

/// A [`CredentialStore`] that keeps the token for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `token`, e.g. one restored from disk.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, token: &str) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
    }

    fn clear(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Owns the reconnection credential and the connection generation counter.
pub struct ReconnectionCoordinator {
    store: Box<dyn CredentialStore>,
    generation: AtomicU64,
}

impl ReconnectionCoordinator {
    pub fn new(store: impl CredentialStore) -> Self {
        Self {
            store: Box::new(store),
            generation: AtomicU64::new(0),
        }
    }

    /// A coordinator backed by a fresh [`MemoryCredentialStore`].
    pub fn in_memory() -> Self {
        Self::new(MemoryCredentialStore::new())
    }

    /// Start a new connection generation. Every earlier generation becomes
    /// stale.
    pub fn begin_connection(&self) -> Generation {
        let next = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation = next, "beginning connection");
        Generation(next)
    }

    /// The most recently started generation (`#0` before any connection).
    pub fn current_generation(&self) -> Generation {
        Generation(self.generation.load(Ordering::Acquire))
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current_generation() == generation
    }

    /// The stored credential, if any.
    pub fn credential(&self) -> Option<String> {
        self.store.get()
    }

    /// URL for the lobby connection: `{ws|wss}://{host}/ws/{lobby_id}`, with
    /// the stored credential appended as `?reconnectToken=` when present.
    pub fn connection_url(&self, config: &LobbyConfig) -> String {
        let base = format!(
            "{}://{}/ws/{}",
            config.deployment.ws_scheme(),
            config.host,
            config.lobby_id
        );
        match self.credential() {
            Some(token) => format!(
                "{base}?{RECONNECT_TOKEN_PARAM}={}",
                encode_query_value(&token)
            ),
            None => base,
        }
    }

    /// Persist the credential from a freshly received snapshot, replacing any
    /// previous one. Empty credentials are ignored.
    pub fn on_snapshot(&self, token: &str) {
        if token.is_empty() {
            debug!("snapshot carried no reconnection credential");
            return;
        }
        self.store.set(token);
        debug!("reconnection credential stored");
    }

    /// The connection for `generation` dropped. The credential is kept so the
    /// caller can resume.
    pub fn on_connection_lost(&self, generation: Generation) {
        info!(
            %generation,
            has_credential = self.credential().is_some(),
            "connection lost; awaiting reconnect"
        );
    }

    /// The server shut the lobby down; its credential cannot be used again.
    pub fn on_shutdown(&self) {
        self.store.clear();
        info!("lobby shut down by server; reconnection credential cleared");
    }
}

impl fmt::Debug for ReconnectionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectionCoordinator")
            .field("generation", &self.current_generation())
            .field("has_credential", &self.credential().is_some())
            .finish()
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(char::from(byte));
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
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

    fn config() -> LobbyConfig {
        LobbyConfig::new(uuid::Uuid::nil()).with_host("play.example.com")
    }

    #[test]
    fn generations_are_monotonic() {
        let coordinator = ReconnectionCoordinator::in_memory();
        assert_eq!(coordinator.current_generation(), Generation::new(0));

        let first = coordinator.begin_connection();
        let second = coordinator.begin_connection();
        assert!(second > first);
        assert!(!coordinator.is_current(first));
        assert!(coordinator.is_current(second));
    }

    #[test]
    fn url_without_credential_has_no_query() {
        let coordinator = ReconnectionCoordinator::in_memory();
        assert_eq!(
            coordinator.connection_url(&config()),
            "ws://play.example.com/ws/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn url_carries_latest_credential() {
        let coordinator = ReconnectionCoordinator::in_memory();
        coordinator.on_snapshot("aa11");
        coordinator.on_snapshot("bb22");
        let url = coordinator.connection_url(&config().with_deployment(Deployment::Production));
        assert_eq!(
            url,
            "wss://play.example.com/ws/00000000-0000-0000-0000-000000000000?reconnectToken=bb22"
        );
    }

    #[test]
    fn empty_snapshot_credential_keeps_previous() {
        let coordinator = ReconnectionCoordinator::new(MemoryCredentialStore::with_token("keep"));
        coordinator.on_snapshot("");
        assert_eq!(coordinator.credential().as_deref(), Some("keep"));
    }

    #[test]
    fn connection_loss_keeps_credential_but_shutdown_clears_it() {
        let coordinator = ReconnectionCoordinator::in_memory();
        coordinator.on_snapshot("tok");
        let generation = coordinator.begin_connection();

        coordinator.on_connection_lost(generation);
        assert_eq!(coordinator.credential().as_deref(), Some("tok"));

        coordinator.on_shutdown();
        assert!(coordinator.credential().is_none());
    }

    #[test]
    fn credential_is_percent_encoded() {
        assert_eq!(encode_query_value("a b&c=d"), "a%20b%26c%3Dd");
        assert_eq!(encode_query_value("0f9e-_.~"), "0f9e-_.~");
    }
}
