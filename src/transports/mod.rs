//! Network backends behind feature gates.
//!
//! | Feature                | Type                   | Role                         |
//! |------------------------|------------------------|------------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] | lobby event channel          |
//! | `time-sync-http`       | [`HttpTimeSource`]     | `/api/time` for clock probes |
//! | `lobby-api`            | [`create_lobby`]       | `POST /api/lobby`            |
//!
//! All are enabled by default. Builds without them (e.g. for a browser host)
//! implement [`Transport`](crate::Transport) and
//! [`TimeSource`](crate::clock::TimeSource) themselves.

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::WebSocketTransport;

#[cfg(feature = "time-sync-http")]
pub mod http_time;

#[cfg(feature = "time-sync-http")]
pub use http_time::HttpTimeSource;

#[cfg(feature = "lobby-api")]
pub mod lobby_api;

#[cfg(feature = "lobby-api")]
pub use lobby_api::{create_lobby, create_lobby_with};
