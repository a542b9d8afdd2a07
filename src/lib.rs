//! # Wordcraft Client
//!
//! Real-time synchronization client for Wordcraft lobbies.
//!
//! A lobby is a small multiplayer word game: participants take turns
//! answering a challenge before a deadline, are eliminated when the deadline
//! passes, and the last one standing wins. The server is authoritative; this
//! crate keeps a local, read-only projection of the lobby in sync with it.
//!
//! ## Pieces
//!
//! - [`state`]: the pure reducer turning server events into a new
//!   [`LobbyState`] plus UI [`Effect`]s
//! - [`clock`]: round-trip clock offset estimation and "seconds remaining"
//! - [`countdown`]: epoch-guarded countdown ticks for the active turn
//! - [`reconnect`]: reconnection credential and connection generations
//! - [`transport`]: the [`Transport`] seam, with a WebSocket implementation
//!   in [`transports`]
//! - [`client`]: [`LobbyClient`], the event loop tying everything together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), wordcraft_client::WordcraftError> {
//! use std::sync::Arc;
//! use wordcraft_client::{
//!     LobbyClient, LobbyConfig, LobbyEvent, ReconnectionCoordinator, WebSocketTransport,
//! };
//!
//! let config = LobbyConfig::new(uuid::Uuid::new_v4()).with_http_time_sync();
//! let coordinator = Arc::new(ReconnectionCoordinator::in_memory());
//!
//! let transport = WebSocketTransport::connect_to_lobby(&coordinator, &config).await?;
//! let (mut client, mut events) = LobbyClient::start(transport, config, coordinator);
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         LobbyEvent::Snapshot { state } => {
//!             println!("{} players in the lobby", state.participants.len());
//!         }
//!         LobbyEvent::Countdown { seconds_remaining } => println!("{seconds_remaining}s"),
//!         LobbyEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod clock;
pub mod countdown;
pub mod error;
pub mod event;
pub mod protocol;
pub mod reconnect;
pub mod state;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{Deployment, LobbyClient, LobbyConfig};
pub use clock::{ClockOffset, TimeSource};
pub use error::WordcraftError;
pub use event::{DisconnectReason, LobbyEvent};
pub use protocol::{ClientMessage, ServerMessage};
pub use reconnect::{Generation, ReconnectionCoordinator};
pub use state::{Effect, GamePhase, LobbyState, Projection};
pub use transport::Transport;

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;

#[cfg(feature = "time-sync-http")]
pub use transports::HttpTimeSource;
#[cfg(feature = "lobby-api")]
pub use transports::create_lobby;
