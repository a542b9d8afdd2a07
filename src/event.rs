//! Events delivered to the application by [`LobbyClient`](crate::client::LobbyClient).

use crate::clock::ClockOffset;
use crate::protocol::Millis;
use crate::reconnect::Generation;
use crate::state::{Effect, LobbyState};

/// Why the event loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The transport ended or failed. Recoverable: reconnect with the stored
    /// credential and wait for the next snapshot.
    ConnectionLost { detail: Option<String> },
    /// The server announced `shutdown`. Terminal: tell the user and leave the
    /// lobby; do not reconnect.
    ServerShutdown,
    /// [`LobbyClient::shutdown`](crate::client::LobbyClient::shutdown) was
    /// called or the handle was dropped.
    ClientShutdown,
}

impl DisconnectReason {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. })
    }
}

/// High-level events emitted by the client event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    /// The event loop is running on a new connection (synthetic, always first).
    Connected { generation: Generation },

    /// A snapshot (re)initialized the projection. Re-render everything.
    Snapshot { state: LobbyState },

    /// A server event changed the projection or produced effects.
    Updated {
        /// Wire name of the event that caused the update.
        kind: &'static str,
        state: LobbyState,
        effects: Vec<Effect>,
    },

    /// The displayed time remaining for the current turn changed.
    Countdown { seconds_remaining: i64 },

    /// The clock probe for this connection finished and was applied.
    ClockSynchronized {
        offset: ClockOffset,
        round_trip_ms: Millis,
    },

    /// The event loop exited (always the last event).
    Disconnected { reason: DisconnectReason },
}
