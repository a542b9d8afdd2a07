//! # Scripted Lobby
//!
//! Plays one complete game against an in-process fake server, using a
//! loopback [`Transport`]. No network is needed; this is also a template for
//! testing presentation code against [`LobbyClient`].
//!
//! ## Running
//!
//! ```sh
//! cargo run --example scripted_lobby
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use wordcraft_client::clock::{Clock, SystemClock};
use wordcraft_client::{
    ClientMessage, DisconnectReason, Effect, LobbyClient, LobbyConfig, LobbyEvent,
    ReconnectionCoordinator, Transport, WordcraftError,
};

// ─────────────────────────────────────────────────────────────────────
// Loopback transport
// ─────────────────────────────────────────────────────────────────────

/// Client half of an in-process channel pair.
struct LoopbackTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

/// Server half: read what the client sent, push server envelopes.
struct LoopbackServer {
    rx: mpsc::UnboundedReceiver<String>,
    tx: mpsc::UnboundedSender<String>,
}

fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();
    (
        LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        },
        LoopbackServer {
            rx: server_rx,
            tx: server_tx,
        },
    )
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), WordcraftError> {
        self.tx
            .send(message)
            .map_err(|e| WordcraftError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, WordcraftError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), WordcraftError> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Fake server
// ─────────────────────────────────────────────────────────────────────

const ME: u32 = 1;
const BOT: u32 = 2;
const TURN_MS: i64 = 4_000;

impl LoopbackServer {
    fn push(&self, envelope: serde_json::Value) {
        let _ = self.tx.send(envelope.to_string());
    }

    fn turn(&self, owner: u32, challenge: &str) {
        let now = SystemClock.now_millis();
        self.push(json!({
            "Type": "clients_turn",
            "Content": {"ClientId": owner, "Challenge": challenge, "TurnEnd": now + TURN_MS, "Now": now}
        }));
    }

    /// Drive a two-player game: we answer, the bot times out.
    async fn run(mut self) {
        self.push(json!({
            "Type": "client_details",
            "Content": {
                "ClientId": ME,
                "ReconnectToken": "5e1f0c3a",
                "Status": 0,
                "Clients": [
                    {"Id": ME, "DisplayName": "you", "IconName": "owl", "Alive": true}
                ]
            }
        }));
        self.push(json!({
            "Type": "client_joined",
            "Content": {"ClientId": BOT, "DisplayName": "bot", "IconName": "robot", "Alive": true}
        }));

        while let Some(text) = self.rx.recv().await {
            let Ok(msg) = serde_json::from_str::<ClientMessage>(&text) else {
                continue;
            };
            tracing::info!("server <- {msg:?}");
            match msg {
                ClientMessage::StartGame => self.turn(ME, "at"),
                ClientMessage::NameChange(name) => self.push(json!({
                    "Type": "name_change",
                    "Content": {"ClientId": ME, "NewDisplayName": name}
                })),
                ClientMessage::AnswerPreview(preview) => {
                    self.push(json!({"Type": "answer_preview", "Content": preview}));
                }
                ClientMessage::SubmitAnswer(answer) => {
                    if !answer.to_lowercase().contains("at") {
                        self.push(json!({"Type": "answer_rejected", "Content": answer}));
                        continue;
                    }
                    self.push(json!({"Type": "answer_accepted", "Content": answer}));
                    self.turn(BOT, "qz");
                    // The bot never answers.
                    tokio::time::sleep(Duration::from_millis(TURN_MS as u64)).await;
                    self.push(json!({
                        "Type": "turn_expired",
                        "Content": {"EliminatedClientId": BOT, "Suggestions": ["quiz", "quartz"]}
                    }));
                    self.push(json!({"Type": "game_over", "Content": ME}));
                    self.push(json!({"Type": "shutdown"}));
                }
                ClientMessage::RestartGame | ClientMessage::ClientDetailsReq => {}
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Client side
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (transport, server) = loopback_pair();
    tokio::spawn(server.run());

    let coordinator = Arc::new(ReconnectionCoordinator::in_memory());
    let config = LobbyConfig::new(uuid::Uuid::new_v4());
    let (mut client, mut events) = LobbyClient::start(transport, config, Arc::clone(&coordinator));

    while let Some(event) = events.recv().await {
        match event {
            LobbyEvent::Snapshot { state } => {
                tracing::info!(
                    "synchronized as #{} with {} participant(s)",
                    state.my_id,
                    state.participants.len()
                );
                client.change_name("Scripted")?;
            }
            LobbyEvent::Updated {
                kind,
                state,
                effects,
            } => {
                tracing::info!("{kind}: {:?}", effects);
                if kind == "client_joined" && state.participants.len() == 2 {
                    client.start_game()?;
                }
                if effects.contains(&Effect::FocusInput) {
                    for prefix in ["c", "ca", "cat"] {
                        client.send_answer_preview(prefix)?;
                    }
                    client.submit_answer("Cat")?;
                }
                if effects.contains(&Effect::StopCountdown) {
                    tracing::info!(
                        "winner: {}",
                        state.winner_name.as_deref().unwrap_or("nobody")
                    );
                }
            }
            LobbyEvent::Countdown { seconds_remaining } => {
                tracing::info!("{seconds_remaining}s left");
            }
            LobbyEvent::Disconnected { reason } => {
                tracing::info!(
                    "disconnected: {reason:?} (credential kept: {})",
                    coordinator.credential().is_some()
                );
                if reason == DisconnectReason::ServerShutdown {
                    tracing::info!("lobby closed by server; not reconnecting");
                }
                break;
            }
            other => tracing::debug!("{other:?}"),
        }
    }

    client.shutdown().await;
    Ok(())
}
