//! # Console Lobby
//!
//! Plays a Wordcraft lobby from the terminal:
//!
//! 1. Create a lobby via `POST /api/lobby` unless an id is given
//! 2. Connect over WebSocket and probe the server clock via `/api/time`
//! 3. Print lobby updates and the turn countdown
//! 4. Read commands from stdin
//! 5. Reconnect with the stored credential when the connection drops
//!
//! ## Running
//!
//! ```sh
//! # Start a Wordcraft server on localhost:8080. Without a lobby id a new
//! # lobby is created first:
//! cargo run --example console_lobby -- [lobby-id]
//!
//! # Another host, over TLS:
//! WORDCRAFT_HOST=wordcraft.example.com PROD=1 cargo run --example console_lobby -- <lobby-id>
//! ```
//!
//! Commands: `/start`, `/name <new name>`, `/restart`, `/details`, `/quit`.
//! Anything else is sent as an answer; prefix it with `~` to only preview it.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use wordcraft_client::{
    create_lobby, Deployment, DisconnectReason, Effect, LobbyClient, LobbyConfig, LobbyEvent,
    LobbyState, ReconnectionCoordinator, WebSocketTransport,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(16);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let mut config = LobbyConfig::new(uuid::Uuid::nil()).with_deployment(Deployment::from_env());
    if let Ok(host) = std::env::var("WORDCRAFT_HOST") {
        config = config.with_host(host);
    }
    config.lobby_id = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => {
            let id = create_lobby(&config).await?;
            println!("created lobby {id}; others join with: console_lobby {id}");
            id
        }
    };
    let config = config.with_http_time_sync();
    let coordinator = Arc::new(ReconnectionCoordinator::in_memory());

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut delay = Duration::from_secs(1);

    // ── Connection loop ─────────────────────────────────────────────
    loop {
        let url = coordinator.connection_url(&config);
        let transport = match WebSocketTransport::connect_with_timeout(&url, CONNECT_TIMEOUT).await
        {
            Ok(transport) => transport,
            Err(e) => {
                tracing::warn!("connect failed: {e}; retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RECONNECT_DELAY);
                continue;
            }
        };

        let (mut client, mut events) =
            LobbyClient::start(transport, config.clone(), Arc::clone(&coordinator));

        let reason = loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        break DisconnectReason::ClientShutdown;
                    };
                    if let LobbyEvent::Disconnected { reason } = event {
                        break reason;
                    }
                    if matches!(event, LobbyEvent::Snapshot { .. }) {
                        delay = Duration::from_secs(1);
                    }
                    render(&event);
                }

                line = stdin.next_line() => {
                    match line? {
                        Some(line) if line.trim() == "/quit" => {
                            client.shutdown().await;
                            return Ok(());
                        }
                        Some(line) => {
                            if let Err(e) = dispatch(&client, &line) {
                                println!("! {e}");
                            }
                        }
                        None => {
                            client.shutdown().await;
                            return Ok(());
                        }
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    client.shutdown().await;
                    return Ok(());
                }
            }
        };

        match reason {
            DisconnectReason::ServerShutdown => {
                println!("*** The server is shutting down. Thanks for playing! ***");
                return Ok(());
            }
            DisconnectReason::ClientShutdown => return Ok(()),
            DisconnectReason::ConnectionLost { detail } => {
                tracing::warn!(
                    "connection lost ({}); reconnecting in {delay:?}",
                    detail.as_deref().unwrap_or("closed by server")
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RECONNECT_DELAY);
            }
        }
    }
}

fn dispatch(client: &LobbyClient, line: &str) -> Result<(), wordcraft_client::WordcraftError> {
    let line = line.trim();
    if let Some(name) = line.strip_prefix("/name ") {
        return client.change_name(name);
    }
    if let Some(preview) = line.strip_prefix('~') {
        return client.send_answer_preview(preview);
    }
    match line {
        "/start" => client.start_game(),
        "/restart" => client.restart_game(),
        "/details" => client.request_details(),
        "" => Ok(()),
        answer => client.submit_answer(answer),
    }
}

fn render(event: &LobbyEvent) {
    match event {
        LobbyEvent::Connected { generation } => println!("-- connected ({generation})"),
        LobbyEvent::ClockSynchronized {
            offset,
            round_trip_ms,
        } => {
            tracing::info!(
                "server clock is {}ms ahead (rtt {round_trip_ms}ms)",
                offset.offset_millis
            );
        }
        LobbyEvent::Snapshot { state } => print_lobby(state),
        LobbyEvent::Updated { state, effects, .. } => {
            for effect in effects {
                print_effect(state, effect);
            }
        }
        LobbyEvent::Countdown { seconds_remaining } => println!("   {seconds_remaining}s"),
        LobbyEvent::Disconnected { .. } => {}
    }
}

fn print_lobby(state: &LobbyState) {
    println!("== lobby ({:?}) ==", state.phase);
    for p in &state.participants {
        let me = if p.id == state.my_id { " (you)" } else { "" };
        let dead = if p.alive { "" } else { " [out]" };
        println!("  {}{me}{dead}", p.display_name);
    }
    if let Some(winner) = &state.winner_name {
        println!("  winner: {winner}");
    }
    if !state.turn.challenge.is_empty() {
        println!(
            "  challenge: {} / preview: {}",
            state.turn.challenge,
            state.turn.preview_display()
        );
    }
}

fn name_of(state: &LobbyState, id: u32) -> &str {
    state
        .participant(id)
        .map_or("someone", |p| p.display_name.as_str())
}

fn print_effect(state: &LobbyState, effect: &Effect) {
    match effect {
        Effect::PlayJoinSound { participant_id } => {
            println!("+ {} joined", name_of(state, *participant_id));
        }
        Effect::ResetCountdown { .. } => {
            let owner = state.turn.owner_id.map_or("someone", |id| name_of(state, id));
            println!("> {owner}'s turn: \"{}\"", state.turn.challenge);
        }
        Effect::FocusInput => println!("> your turn, type an answer"),
        Effect::PlayAcceptedSound { answer } => println!("✓ {answer}"),
        Effect::ShakeInput { .. } => println!("✗ rejected"),
        Effect::PlayEliminatedSound { participant_id } => {
            println!(
                "x {} is out (could have said: {})",
                name_of(state, *participant_id),
                state.turn.suggestions.join(", ")
            );
        }
        Effect::ClearInputFocus => println!("x you are out"),
        Effect::StopCountdown => {
            println!(
                "# game over, {} wins",
                state.winner_name.as_deref().unwrap_or("nobody")
            );
        }
        Effect::ClearEliminationMarkers => print_lobby(state),
        Effect::NotifyShutdown => println!("! server shutting down"),
    }
}
