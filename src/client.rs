//! Async client for a Wordcraft lobby.
//!
//! [`LobbyClient`] is a thin handle over a background event loop task. The
//! loop is the single logical thread of the client: it alone applies server
//! events to the [`Projection`], drives the [`CountdownScheduler`] and applies
//! clock probe results. Outbound intents (answers, name changes, game
//! start/restart) go straight to the server; the projection only changes when
//! the server echoes a corresponding event.
//!
//! # Example
//!
//! ```rust,ignore
//! let coordinator = Arc::new(ReconnectionCoordinator::in_memory());
//! let config = LobbyConfig::new(lobby_id).with_http_time_sync();
//!
//! let url = coordinator.connection_url(&config);
//! let transport = WebSocketTransport::connect(&url).await?;
//! let (mut client, mut events) = LobbyClient::start(transport, config, coordinator);
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         LobbyEvent::Snapshot { state } => render_all(&state),
//!         LobbyEvent::Updated { state, effects, .. } => render(&state, &effects),
//!         LobbyEvent::Countdown { seconds_remaining } => show_timer(seconds_remaining),
//!         LobbyEvent::Disconnected { reason } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::{probe, Clock, ClockSync, ProbeSample, SystemClock, TimeSource};
use crate::countdown::{CountdownScheduler, CountdownTick};
use crate::error::{Result, WordcraftError};
use crate::event::{DisconnectReason, LobbyEvent};
use crate::protocol::{decode_server_message, ClientMessage, Inbound, LobbyId, ServerMessage};
use crate::reconnect::{Generation, ReconnectionCoordinator};
use crate::state::{Effect, GamePhase, Projection};
use crate::transport::Transport;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default countdown cadence.
const DEFAULT_COUNTDOWN_TICK: Duration = Duration::from_millis(250);
const MIN_COUNTDOWN_TICK: Duration = Duration::from_millis(100);
const MAX_COUNTDOWN_TICK: Duration = Duration::from_millis(1000);

/// Default upper bound for one clock probe.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_HOST: &str = "localhost:8080";

/// Longest display name the server accepts, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 15;

// ── Configuration ───────────────────────────────────────────────────

/// Deployment environment; selects between plain and TLS schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deployment {
    /// `ws://` and `http://`.
    #[default]
    Development,
    /// `wss://` and `https://`.
    Production,
}

impl Deployment {
    /// `Production` if the `PROD` environment variable is set and non-empty.
    pub fn from_env() -> Self {
        match std::env::var("PROD") {
            Ok(value) if !value.is_empty() => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn ws_scheme(self) -> &'static str {
        match self {
            Self::Development => "ws",
            Self::Production => "wss",
        }
    }

    pub fn http_scheme(self) -> &'static str {
        match self {
            Self::Development => "http",
            Self::Production => "https",
        }
    }
}

/// Configuration for one lobby.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use wordcraft_client::client::{Deployment, LobbyConfig};
///
/// let config = LobbyConfig::new(uuid::Uuid::nil())
///     .with_host("wordcraft.example.com")
///     .with_deployment(Deployment::Production)
///     .with_countdown_tick(Duration::from_millis(500));
/// assert_eq!(config.http_base_url(), "https://wordcraft.example.com");
/// ```
#[derive(Clone)]
pub struct LobbyConfig {
    /// Lobby to connect to.
    pub lobby_id: LobbyId,
    /// `host[:port]` of the game server. Defaults to `localhost:8080`.
    pub host: String,
    pub deployment: Deployment,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up, events are dropped (with a warning)
    /// to avoid blocking the event loop. The final `Disconnected` event is
    /// always delivered. Defaults to **256**; values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// How long [`LobbyClient::shutdown`] waits for the loop to close the
    /// transport before aborting it. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Countdown cadence, clamped to 100ms..=1000ms. Defaults to **250ms**.
    pub countdown_tick: Duration,
    /// Upper bound for the clock probe. Defaults to **5 seconds**.
    pub probe_timeout: Duration,
    /// Time-sync endpoint. Without one the local clock is trusted as is.
    pub time_source: Option<Arc<dyn TimeSource>>,
    /// Local clock used for probes and countdowns.
    pub clock: Arc<dyn Clock>,
}

impl LobbyConfig {
    /// Create a configuration for `lobby_id` with default values.
    pub fn new(lobby_id: LobbyId) -> Self {
        Self {
            lobby_id,
            host: DEFAULT_HOST.to_string(),
            deployment: Deployment::default(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            countdown_tick: DEFAULT_COUNTDOWN_TICK,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            time_source: None,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn with_deployment(mut self, deployment: Deployment) -> Self {
        self.deployment = deployment;
        self
    }

    /// Set the capacity of the bounded event channel (clamped to at least 1).
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the countdown cadence (clamped to 100ms..=1000ms).
    #[must_use]
    pub fn with_countdown_tick(mut self, tick: Duration) -> Self {
        self.countdown_tick = tick.clamp(MIN_COUNTDOWN_TICK, MAX_COUNTDOWN_TICK);
        self
    }

    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_time_source(mut self, source: impl TimeSource) -> Self {
        self.time_source = Some(Arc::new(source));
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Use the server's `/api/time` endpoint for clock probes.
    #[cfg(feature = "time-sync-http")]
    #[must_use]
    pub fn with_http_time_sync(self) -> Self {
        let source = crate::transports::HttpTimeSource::for_config(&self);
        self.with_time_source(source)
    }

    /// `{http|https}://{host}`.
    pub fn http_base_url(&self) -> String {
        format!("{}://{}", self.deployment.http_scheme(), self.host)
    }
}

impl fmt::Debug for LobbyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobbyConfig")
            .field("lobby_id", &self.lobby_id)
            .field("host", &self.host)
            .field("deployment", &self.deployment)
            .field("event_channel_capacity", &self.event_channel_capacity)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("countdown_tick", &self.countdown_tick)
            .field("probe_timeout", &self.probe_timeout)
            .field("has_time_source", &self.time_source.is_some())
            .finish_non_exhaustive()
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async handle for one lobby connection.
///
/// Created via [`LobbyClient::start`], which spawns the background event loop
/// and returns this handle together with an event receiver. Outbound methods
/// queue a [`ClientMessage`] and return immediately.
pub struct LobbyClient {
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    connected: Arc<AtomicBool>,
    generation: Generation,
    projection: watch::Receiver<Projection>,
    task: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl LobbyClient {
    /// Start the event loop on a connected transport.
    ///
    /// Begins a new connection generation on `coordinator`, which also makes
    /// any earlier connection's pending clock probe stale.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: LobbyConfig,
        coordinator: Arc<ReconnectionCoordinator>,
    ) -> (Self, mpsc::Receiver<LobbyEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<LobbyEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (projection_tx, projection_rx) = watch::channel(Projection::Uninitialized);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel::<LoopSignal>();

        let generation = coordinator.begin_connection();
        let connected = Arc::new(AtomicBool::new(true));

        let session = Session {
            transport,
            cmd_rx,
            signal_tx,
            signal_rx,
            event_tx,
            projection_tx,
            connected: Arc::clone(&connected),
            coordinator,
            generation,
            projection: Projection::Uninitialized,
            clock_sync: ClockSync::new(generation),
            countdown: CountdownScheduler::new(config.countdown_tick),
            clock: config.clock,
            time_source: config.time_source,
            probe_timeout: config.probe_timeout,
            probe_task: None,
        };

        let task = tokio::spawn(session.run(shutdown_rx));

        let client = Self {
            cmd_tx,
            connected,
            generation,
            projection: projection_rx,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Outbound intents ────────────────────────────────────────────

    /// Ask the server to start the game.
    ///
    /// # Errors
    ///
    /// Returns [`WordcraftError::NotConnected`] if the event loop has exited.
    pub fn start_game(&self) -> Result<()> {
        self.send(ClientMessage::StartGame)
    }

    /// Submit the answer for the current turn.
    ///
    /// # Errors
    ///
    /// Returns [`WordcraftError::NotConnected`] if the event loop has exited.
    pub fn submit_answer(&self, answer: impl Into<String>) -> Result<()> {
        self.send(ClientMessage::SubmitAnswer(answer.into()))
    }

    /// Broadcast the in-progress answer, lower-cased.
    ///
    /// # Errors
    ///
    /// Returns [`WordcraftError::NotConnected`] if the event loop has exited.
    pub fn send_answer_preview(&self, text: &str) -> Result<()> {
        self.send(ClientMessage::AnswerPreview(text.to_lowercase()))
    }

    /// Request a new display name (surrounding whitespace is trimmed).
    ///
    /// # Errors
    ///
    /// - [`WordcraftError::InvalidDisplayName`] if the trimmed name is empty
    ///   or longer than [`MAX_DISPLAY_NAME_CHARS`]
    /// - [`WordcraftError::NotConnected`] if the event loop has exited
    pub fn change_name(&self, name: &str) -> Result<()> {
        let name = name.trim();
        let len = name.chars().count();
        if len == 0 || len > MAX_DISPLAY_NAME_CHARS {
            return Err(WordcraftError::InvalidDisplayName {
                len,
                max: MAX_DISPLAY_NAME_CHARS,
            });
        }
        self.send(ClientMessage::NameChange(name.to_string()))
    }

    /// Ask the server to restart a finished game.
    ///
    /// # Errors
    ///
    /// Returns [`WordcraftError::NotConnected`] if the event loop has exited.
    pub fn restart_game(&self) -> Result<()> {
        self.send(ClientMessage::RestartGame)
    }

    /// Ask the server for a fresh `client_details` snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`WordcraftError::NotConnected`] if the event loop has exited.
    pub fn request_details(&self) -> Result<()> {
        self.send(ClientMessage::ClientDetailsReq)
    }

    /// Shut down the client, closing the transport and stopping the event loop.
    pub async fn shutdown(&mut self) {
        debug!("LobbyClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("event loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("event loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("event loop aborted: {join_err}");
                    }
                }
            }
        }

        self.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` while the event loop is running on a live transport.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// The connection generation this client was started with.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Read-only copy of the current projection.
    pub fn state(&self) -> Projection {
        self.projection.borrow().clone()
    }

    /// Subscribe to projection changes.
    pub fn watch_state(&self) -> watch::Receiver<Projection> {
        self.projection.clone()
    }

    fn send(&self, msg: ClientMessage) -> Result<()> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(WordcraftError::NotConnected);
        }
        self.cmd_tx
            .send(msg)
            .map_err(|_| WordcraftError::NotConnected)
    }
}

impl fmt::Debug for LobbyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobbyClient")
            .field("connected", &self.is_connected())
            .field("generation", &self.generation)
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for LobbyClient {
    fn drop(&mut self) {
        // No executor is available to await a graceful close here; aborting
        // drops the loop future and with it the transport.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Event loop ──────────────────────────────────────────────────────

/// Internal wake-ups posted into the loop's queue.
#[derive(Debug)]
enum LoopSignal {
    Tick(CountdownTick),
    Probed {
        generation: Generation,
        result: Result<ProbeSample>,
    },
}

/// State owned exclusively by the event loop task.
struct Session<T: Transport> {
    transport: T,
    cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    signal_tx: mpsc::UnboundedSender<LoopSignal>,
    signal_rx: mpsc::UnboundedReceiver<LoopSignal>,
    event_tx: mpsc::Sender<LobbyEvent>,
    projection_tx: watch::Sender<Projection>,
    connected: Arc<AtomicBool>,
    coordinator: Arc<ReconnectionCoordinator>,
    generation: Generation,
    projection: Projection,
    clock_sync: ClockSync,
    countdown: CountdownScheduler,
    clock: Arc<dyn Clock>,
    time_source: Option<Arc<dyn TimeSource>>,
    probe_timeout: Duration,
    probe_task: Option<JoinHandle<()>>,
}

impl<T: Transport> Session<T> {
    /// Multiplex commands, shutdown, inbound messages and internal signals
    /// until the connection ends.
    async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) {
        debug!(generation = %self.generation, "event loop started");
        self.emit(LobbyEvent::Connected {
            generation: self.generation,
        });
        self.spawn_probe();

        let reason = loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(msg) => {
                            if let Err(e) = self.send_message(&msg).await {
                                error!("transport send error: {e}");
                                break DisconnectReason::ConnectionLost {
                                    detail: Some(format!("transport send error: {e}")),
                                };
                            }
                        }
                        // Command channel closed: handle dropped.
                        None => {
                            debug!("command channel closed, shutting down event loop");
                            let _ = self.transport.close().await;
                            break DisconnectReason::ClientShutdown;
                        }
                    }
                }

                _ = &mut shutdown_rx => {
                    debug!("shutdown signal received");
                    let _ = self.transport.close().await;
                    break DisconnectReason::ClientShutdown;
                }

                incoming = self.transport.recv() => {
                    match incoming {
                        Some(Ok(text)) => {
                            if self.on_text(&text) {
                                let _ = self.transport.close().await;
                                break DisconnectReason::ServerShutdown;
                            }
                        }
                        Some(Err(e)) => {
                            error!("transport receive error: {e}");
                            break DisconnectReason::ConnectionLost {
                                detail: Some(format!("transport receive error: {e}")),
                            };
                        }
                        None => {
                            debug!("transport closed by server");
                            break DisconnectReason::ConnectionLost { detail: None };
                        }
                    }
                }

                Some(signal) = self.signal_rx.recv() => {
                    self.on_signal(signal);
                }
            }
        };

        self.finish(reason).await;
        debug!(generation = %self.generation, "event loop exited");
    }

    async fn send_message(&mut self, msg: &ClientMessage) -> Result<()> {
        debug!("sending client message: {:?}", std::mem::discriminant(msg));
        match serde_json::to_string(msg) {
            Ok(json) => self.transport.send(json).await,
            Err(e) => {
                // Serialization errors are programming bugs; keep the loop alive.
                error!("failed to serialize ClientMessage: {e}");
                Ok(())
            }
        }
    }

    /// Handle one inbound text frame. Returns `true` if the server shut the
    /// lobby down.
    fn on_text(&mut self, text: &str) -> bool {
        match decode_server_message(text) {
            Ok(Inbound::Message(message)) => self.on_message(&message),
            Ok(Inbound::Unrecognized(kind)) => {
                debug!(%kind, "ignoring unrecognized message type");
                false
            }
            Err(e) => {
                warn!("dropping undecodable server message: {e}");
                false
            }
        }
    }

    fn on_message(&mut self, message: &ServerMessage) -> bool {
        let previous = std::mem::take(&mut self.projection);
        let unchanged = previous.clone();
        let (next, effects) = previous.apply(message);
        let changed = next != unchanged;
        self.projection = next;
        if changed {
            self.projection_tx.send_replace(self.projection.clone());
        }

        if let ServerMessage::ClientDetails(snapshot) = message {
            self.coordinator.on_snapshot(&snapshot.reconnect_token);
            self.sync_countdown_to_projection();
            if let Some(state) = self.projection.state() {
                info!(
                    my_id = state.my_id,
                    phase = ?state.phase,
                    participants = state.participants.len(),
                    "synchronized from snapshot"
                );
                let state = state.clone();
                self.emit(LobbyEvent::Snapshot { state });
            }
            return false;
        }

        for effect in &effects {
            match effect {
                Effect::ResetCountdown { deadline } => self.start_countdown(*deadline),
                Effect::StopCountdown => {
                    self.countdown.cancel();
                }
                _ => {}
            }
        }
        if self.active_deadline().is_none() {
            self.countdown.cancel();
        }

        if changed || !effects.is_empty() {
            if let Some(state) = self.projection.state() {
                let state = state.clone();
                self.emit(LobbyEvent::Updated {
                    kind: message.kind(),
                    state,
                    effects,
                });
            }
        }

        matches!(message, ServerMessage::Shutdown)
    }

    /// Start or stop the countdown to match the projection after a snapshot.
    fn sync_countdown_to_projection(&mut self) {
        match self.active_deadline() {
            Some(deadline) => self.start_countdown(deadline),
            None => {
                self.countdown.cancel();
            }
        }
    }

    /// Deadline of the turn currently in progress, if any.
    fn active_deadline(&self) -> Option<i64> {
        self.projection
            .state()
            .filter(|state| state.phase == GamePhase::InProgress)
            .and_then(|state| state.turn.deadline)
    }

    fn start_countdown(&mut self, deadline: i64) {
        let tx = self.signal_tx.clone();
        self.countdown
            .start(deadline, move |tick| tx.send(LoopSignal::Tick(tick)).is_ok());
    }

    fn on_signal(&mut self, signal: LoopSignal) {
        match signal {
            LoopSignal::Tick(tick) => self.on_tick(tick),
            LoopSignal::Probed { generation, result } => self.on_probe(generation, result),
        }
    }

    fn on_tick(&mut self, tick: CountdownTick) {
        if !self.countdown.is_for(self.active_deadline()) {
            if self.countdown.cancel() {
                debug!(epoch = tick.epoch, "turn moved on; countdown stopped");
            }
            return;
        }
        let now = self.clock.now_millis();
        if let Some(seconds_remaining) = self.countdown.on_tick(tick, now, self.clock_sync.offset())
        {
            self.emit(LobbyEvent::Countdown { seconds_remaining });
        }
    }

    fn on_probe(&mut self, generation: Generation, result: Result<ProbeSample>) {
        if !self.coordinator.is_current(generation) {
            debug!(%generation, "discarding clock probe for a superseded connection");
            return;
        }
        match result {
            Ok(sample) => {
                if self.clock_sync.accept(generation, &sample) {
                    info!(
                        offset_ms = sample.offset().offset_millis,
                        rtt_ms = sample.round_trip(),
                        "clock synchronized"
                    );
                    self.emit(LobbyEvent::ClockSynchronized {
                        offset: sample.offset(),
                        round_trip_ms: sample.round_trip(),
                    });
                }
            }
            Err(e) => warn!("clock probe failed, using local clock: {e}"),
        }
    }

    fn spawn_probe(&mut self) {
        let Some(source) = self.time_source.clone() else {
            debug!("no time source configured; countdown uses the local clock");
            return;
        };
        let clock = Arc::clone(&self.clock);
        let tx = self.signal_tx.clone();
        let generation = self.generation;
        let timeout = self.probe_timeout;

        self.probe_task = Some(tokio::spawn(async move {
            let result = tokio::time::timeout(timeout, probe(clock.as_ref(), source.as_ref()))
                .await
                .unwrap_or(Err(WordcraftError::Timeout));
            let _ = tx.send(LoopSignal::Probed { generation, result });
        }));
    }

    /// Tear down per-connection work and deliver the final event.
    async fn finish(&mut self, reason: DisconnectReason) {
        self.connected.store(false, Ordering::Release);
        self.countdown.cancel();
        if let Some(task) = self.probe_task.take() {
            task.abort();
        }

        match &reason {
            DisconnectReason::ConnectionLost { .. } => {
                self.projection = Projection::Uninitialized;
                self.projection_tx.send_replace(Projection::Uninitialized);
                self.coordinator.on_connection_lost(self.generation);
            }
            DisconnectReason::ServerShutdown => self.coordinator.on_shutdown(),
            DisconnectReason::ClientShutdown => {}
        }

        // `Disconnected` is always the last event and must not be dropped.
        if self
            .event_tx
            .send(LobbyEvent::Disconnected { reason })
            .await
            .is_err()
        {
            debug!("event channel closed, receiver dropped");
        }
    }

    /// Emit an event without blocking; drops it with a warning when the
    /// channel is full.
    fn emit(&self, event: LobbyEvent) {
        match self.event_tx.try_send(event) {
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
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// A mock transport that records sent messages and replays scripted responses.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, WordcraftError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, WordcraftError>>>,
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
        async fn send(&mut self, message: String) -> std::result::Result<(), WordcraftError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, WordcraftError>> {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else {
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), WordcraftError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    fn start(
        incoming: Vec<Option<std::result::Result<String, WordcraftError>>>,
    ) -> (
        LobbyClient,
        mpsc::Receiver<LobbyEvent>,
        Arc<StdMutex<Vec<String>>>,
    ) {
        let (transport, sent, _closed) = MockTransport::new(incoming);
        let config = LobbyConfig::new(uuid::Uuid::nil());
        let coordinator = Arc::new(ReconnectionCoordinator::in_memory());
        let (client, events) = LobbyClient::start(transport, config, coordinator);
        (client, events, sent)
    }

    #[tokio::test]
    async fn connected_is_first_event() {
        let (mut client, mut events, _sent) = start(vec![]);
        let event = events.recv().await.unwrap();
        assert!(matches!(event, LobbyEvent::Connected { generation } if generation.get() == 1));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn config_defaults() {
        let config = LobbyConfig::new(uuid::Uuid::nil());
        assert_eq!(config.host, "localhost:8080");
        assert_eq!(config.deployment, Deployment::Development);
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.countdown_tick, Duration::from_millis(250));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert!(config.time_source.is_none());
    }

    #[tokio::test]
    async fn countdown_tick_is_clamped() {
        let fast = LobbyConfig::new(uuid::Uuid::nil()).with_countdown_tick(Duration::from_millis(1));
        assert_eq!(fast.countdown_tick, Duration::from_millis(100));
        let slow = LobbyConfig::new(uuid::Uuid::nil()).with_countdown_tick(Duration::from_secs(9));
        assert_eq!(slow.countdown_tick, Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn event_channel_capacity_is_clamped_to_one() {
        let config = LobbyConfig::new(uuid::Uuid::nil()).with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[tokio::test]
    async fn answer_preview_is_lower_cased() {
        let (mut client, mut events, sent) = start(vec![]);
        let _ = events.recv().await; // Connected

        client.send_answer_preview("CaT").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            let msg: ClientMessage = serde_json::from_str(&messages[0]).unwrap();
            assert_eq!(msg, ClientMessage::AnswerPreview("cat".into()));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn change_name_validates_length() {
        let (mut client, mut events, sent) = start(vec![]);
        let _ = events.recv().await; // Connected

        let err = client.change_name("   ").unwrap_err();
        assert!(matches!(err, WordcraftError::InvalidDisplayName { len: 0, .. }));
        let err = client.change_name("a-very-long-display-name").unwrap_err();
        assert!(matches!(err, WordcraftError::InvalidDisplayName { len: 24, max: 15 }));

        client.change_name("  Alice ").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let messages = sent.lock().unwrap();
            assert_eq!(messages.len(), 1);
            let msg: ClientMessage = serde_json::from_str(&messages[0]).unwrap();
            assert_eq!(msg, ClientMessage::NameChange("Alice".into()));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn not_connected_error_after_shutdown() {
        let (mut client, mut events, _sent) = start(vec![]);
        let _ = events.recv().await; // Connected
        client.shutdown().await;
        assert!(matches!(client.start_game(), Err(WordcraftError::NotConnected)));
    }

    #[tokio::test]
    async fn debug_impls_do_not_leak_internals() {
        let (mut client, mut events, _sent) = start(vec![]);
        let _ = events.recv().await;
        let debug = format!("{client:?}");
        assert!(debug.contains("LobbyClient"));
        assert!(debug.contains("connected"));

        let config = format!("{:?}", LobbyConfig::new(uuid::Uuid::nil()));
        assert!(config.contains("has_time_source"));
        client.shutdown().await;
    }

    #[test]
    fn deployment_selects_schemes() {
        assert_eq!(Deployment::Development.ws_scheme(), "ws");
        assert_eq!(Deployment::Production.ws_scheme(), "wss");
        assert_eq!(Deployment::Development.http_scheme(), "http");
        assert_eq!(Deployment::Production.http_scheme(), "https");
    }
}
