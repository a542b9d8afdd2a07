#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Wordcraft client integration tests.
//!
//! Provides a scripted [`MockTransport`], a controllable clock and time
//! source, and helpers that build server envelopes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use wordcraft_client::clock::{Clock, TimeSource};
use wordcraft_client::protocol::{
    ClientDetailsPayload, ClientId, ClientInfo, ClientJoinedPayload, ClientsTurnPayload, Millis,
    NameChangePayload, ServerMessage, TurnExpiredPayload,
};
use wordcraft_client::{GamePhase, LobbyEvent, Transport, WordcraftError};

// ── MockTransport ───────────────────────────────────────────────────

/// A scripted mock transport for integration testing.
///
/// Scripted server messages are consumed in order by `recv()`. Once the
/// script is exhausted, `recv()` waits on the live feed returned by
/// [`MockTransport::with_feed`] (or forever, if there is none).
pub struct MockTransport {
    incoming: VecDeque<Option<Result<String, WordcraftError>>>,
    feed: Option<mpsc::UnboundedReceiver<Option<Result<String, WordcraftError>>>>,
    /// Recorded outgoing messages from the client.
    pub sent: Arc<StdMutex<Vec<String>>>,
    /// Whether `close()` has been called.
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a mock transport with the given scripted incoming messages.
    ///
    /// Returns the transport plus shared handles for inspecting sent messages
    /// and whether close was called.
    pub fn new(
        incoming: Vec<Option<Result<String, WordcraftError>>>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            feed: None,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }

    /// Attach a live feed so a test can push server messages while the
    /// client is running. Push `None` to simulate the server closing.
    pub fn with_feed(
        mut self,
    ) -> (
        Self,
        mpsc::UnboundedSender<Option<Result<String, WordcraftError>>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feed = Some(rx);
        (self, tx)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), WordcraftError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, WordcraftError>> {
        if let Some(item) = self.incoming.pop_front() {
            return item;
        }
        match self.feed.as_mut() {
            Some(feed) => match feed.recv().await {
                Some(item) => item,
                None => std::future::pending().await,
            },
            // Hang forever so the event loop stays alive until shutdown.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), WordcraftError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── Time doubles ────────────────────────────────────────────────────

/// A local clock that only moves when told to.
#[derive(Clone, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn at(millis: Millis) -> Self {
        Self(Arc::new(AtomicI64::new(millis)))
    }

    pub fn set(&self, millis: Millis) {
        self.0.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: Millis) {
        self.0.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> Millis {
        self.0.load(Ordering::SeqCst)
    }
}

/// A time source that always reports the same server time.
pub struct FixedTimeSource(pub Millis);

#[async_trait]
impl TimeSource for FixedTimeSource {
    async fn server_time(&self) -> Result<Millis, WordcraftError> {
        Ok(self.0)
    }
}

/// A time source whose answer is released by the test.
pub struct GatedTimeSource {
    gate: tokio::sync::Mutex<Option<tokio::sync::oneshot::Receiver<Millis>>>,
}

impl GatedTimeSource {
    pub fn new() -> (Self, tokio::sync::oneshot::Sender<Millis>) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let source = Self {
            gate: tokio::sync::Mutex::new(Some(rx)),
        };
        (source, tx)
    }
}

#[async_trait]
impl TimeSource for GatedTimeSource {
    async fn server_time(&self) -> Result<Millis, WordcraftError> {
        let gate = self.gate.lock().await.take();
        match gate {
            Some(rx) => rx
                .await
                .map_err(|_| WordcraftError::TimeSync("gate dropped".into())),
            None => Err(WordcraftError::TimeSync("gate already used".into())),
        }
    }
}

// ── Envelope helpers ────────────────────────────────────────────────

fn encode(message: &ServerMessage) -> String {
    serde_json::to_string(message).expect("server message serialization")
}

/// A participant entry for a snapshot.
pub fn client(id: ClientId, name: &str, alive: bool) -> ClientInfo {
    ClientInfo {
        id,
        display_name: name.into(),
        icon_name: format!("icon-{id}"),
        alive,
    }
}

/// Snapshot of a waiting lobby where this client is `my_id`.
pub fn waiting_snapshot(my_id: ClientId, clients: Vec<ClientInfo>) -> ClientDetailsPayload {
    ClientDetailsPayload {
        client_id: my_id,
        reconnect_token: format!("token-{my_id}"),
        status: GamePhase::Waiting,
        clients,
        ..ClientDetailsPayload::default()
    }
}

/// Snapshot of a game in progress.
pub fn in_progress_snapshot(
    my_id: ClientId,
    clients: Vec<ClientInfo>,
    owner: ClientId,
    challenge: &str,
    turn_end: Millis,
) -> ClientDetailsPayload {
    ClientDetailsPayload {
        status: GamePhase::InProgress,
        current_turn_id: owner,
        current_challenge: challenge.into(),
        turn_end,
        ..waiting_snapshot(my_id, clients)
    }
}

pub fn snapshot_json(snapshot: ClientDetailsPayload) -> String {
    encode(&ServerMessage::ClientDetails(Box::new(snapshot)))
}

pub fn client_joined_json(id: ClientId, name: &str) -> String {
    encode(&ServerMessage::ClientJoined(ClientJoinedPayload {
        client_id: id,
        display_name: name.into(),
        icon_name: format!("icon-{id}"),
        alive: true,
    }))
}

pub fn client_left_json(id: ClientId) -> String {
    encode(&ServerMessage::ClientLeft(id))
}

pub fn name_change_json(id: ClientId, name: &str) -> String {
    encode(&ServerMessage::NameChange(NameChangePayload {
        client_id: id,
        new_display_name: name.into(),
    }))
}

pub fn clients_turn_json(owner: ClientId, challenge: &str, turn_end: Millis) -> String {
    encode(&ServerMessage::ClientsTurn(ClientsTurnPayload {
        client_id: owner,
        challenge: challenge.into(),
        turn_end: Some(turn_end),
        now: turn_end - 10_000,
    }))
}

pub fn answer_preview_json(text: &str) -> String {
    encode(&ServerMessage::AnswerPreview(text.into()))
}

pub fn answer_accepted_json(answer: &str) -> String {
    encode(&ServerMessage::AnswerAccepted(answer.into()))
}

pub fn turn_expired_json(eliminated: ClientId, suggestions: &[&str]) -> String {
    encode(&ServerMessage::TurnExpired(TurnExpiredPayload {
        eliminated_client_id: eliminated,
        suggestions: suggestions.iter().map(|s| (*s).to_string()).collect(),
    }))
}

pub fn game_over_json(winner: ClientId) -> String {
    encode(&ServerMessage::GameOver(winner))
}

pub fn restart_game_json() -> String {
    encode(&ServerMessage::RestartGame)
}

pub fn shutdown_json() -> String {
    encode(&ServerMessage::Shutdown)
}

/// Wrap envelopes as successful scripted receives.
pub fn script(messages: impl IntoIterator<Item = String>) -> Vec<Option<Result<String, WordcraftError>>> {
    messages.into_iter().map(|m| Some(Ok(m))).collect()
}

// ── Event helpers ───────────────────────────────────────────────────

/// Route client logs to the test harness output (`RUST_LOG` filters).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Receive the next event, failing the test after one second of silence.
pub async fn next_event(rx: &mut mpsc::Receiver<LobbyEvent>) -> LobbyEvent {
    tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Skip events until one matches `pred`, returning it.
pub async fn wait_for(
    rx: &mut mpsc::Receiver<LobbyEvent>,
    pred: impl Fn(&LobbyEvent) -> bool,
) -> LobbyEvent {
    loop {
        let event = next_event(rx).await;
        if pred(&event) {
            return event;
        }
    }
}
