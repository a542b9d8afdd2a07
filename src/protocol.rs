//! Wire-compatible protocol types for the Wordcraft lobby protocol.
//!
//! Every message is a JSON envelope `{"Type": <name>, "Content": <payload>}`
//! with PascalCase payload fields. Timestamps are integer milliseconds since
//! the Unix epoch on the **server** clock. Zero-payload messages carry a
//! `null` (or absent) `Content`.
//!
//! Inbound text should go through [`decode_server_message`] rather than a
//! plain `serde_json::from_str`: it tolerates unknown message types (forward
//! compatibility) and reports payload errors per message kind.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, WordcraftError};

// ── Type aliases ────────────────────────────────────────────────────

/// Server-assigned participant identifier, unique within a lobby, `>= 1`.
pub type ClientId = u32;

/// Identifier of a lobby (one connection per lobby).
pub type LobbyId = Uuid;

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

// ── Enums ───────────────────────────────────────────────────────────

/// Phase of the game in a lobby.
///
/// Sent on the wire as an integer (`0`, `1`, `2`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum GamePhase {
    /// Players are gathering; no turn has been taken yet.
    #[default]
    Waiting,
    /// Turns are being played.
    InProgress,
    /// A winner has been decided.
    Over,
}

impl TryFrom<u8> for GamePhase {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Waiting),
            1 => Ok(Self::InProgress),
            2 => Ok(Self::Over),
            other => Err(format!("unknown game status {other}")),
        }
    }
}

impl From<GamePhase> for u8 {
    fn from(phase: GamePhase) -> Self {
        match phase {
            GamePhase::Waiting => 0,
            GamePhase::InProgress => 1,
            GamePhase::Over => 2,
        }
    }
}

// ── Payload structs ─────────────────────────────────────────────────

/// A participant as described inside a `client_details` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClientInfo {
    pub id: ClientId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub icon_name: String,
    #[serde(default)]
    pub alive: bool,
}

/// Payload of `client_details`: the full lobby snapshot sent once per
/// connection establishment.
///
/// Sentinel values follow the server: `0` means "no turn owner" / "no
/// deadline" and the empty string means "no challenge" / "no winner".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct ClientDetailsPayload {
    /// The id assigned to this client.
    pub client_id: ClientId,
    /// Opaque credential to resume this identity after a dropped connection.
    pub reconnect_token: String,
    pub status: GamePhase,
    /// Participants in arrival (id) order.
    pub clients: Vec<ClientInfo>,
    pub current_turn_id: ClientId,
    pub current_challenge: String,
    pub current_answer_prev: String,
    pub turn_end: Millis,
    /// Server time when the snapshot was produced.
    pub now: Millis,
    pub winners_name: String,
}

/// Payload of `client_joined`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClientJoinedPayload {
    pub client_id: ClientId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub icon_name: String,
    #[serde(default)]
    pub alive: bool,
}

/// Payload of `name_change`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NameChangePayload {
    pub client_id: ClientId,
    pub new_display_name: String,
}

/// Payload of `clients_turn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClientsTurnPayload {
    /// Whose turn it is.
    pub client_id: ClientId,
    /// Substring the answer must contain, e.g. `"atr"`.
    #[serde(default)]
    pub challenge: String,
    /// Absolute turn deadline on the server clock. Absent (or zero) when
    /// the server did not send one; the turn still changes hands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_end: Option<Millis>,
    /// Server time when the turn started.
    #[serde(default)]
    pub now: Millis,
}

/// Payload of `turn_expired`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TurnExpiredPayload {
    pub eliminated_client_id: ClientId,
    /// Words the eliminated player could have answered with.
    #[serde(default)]
    pub suggestions: Vec<String>,
}

// ── Messages ────────────────────────────────────────────────────────

/// Message types sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Type", content = "Content", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Begin the game (only honored while waiting for players).
    StartGame,
    /// Submit the final answer for the current turn.
    SubmitAnswer(String),
    /// Live preview of the unsubmitted answer, broadcast to the lobby.
    AnswerPreview(String),
    /// Request a new display name.
    NameChange(String),
    /// Restart a finished game.
    RestartGame,
    /// Ask the server for a fresh `client_details` snapshot.
    #[serde(rename = "client_details_req")]
    ClientDetailsReq,
}

/// Message types sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Type", content = "Content", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full snapshot (boxed to reduce enum size).
    ClientDetails(Box<ClientDetailsPayload>),
    /// A participant joined.
    ClientJoined(ClientJoinedPayload),
    /// A participant left; carries their id.
    ClientLeft(ClientId),
    /// A participant changed their display name.
    NameChange(NameChangePayload),
    /// A new turn started.
    ClientsTurn(ClientsTurnPayload),
    /// The turn owner's in-progress answer.
    AnswerPreview(String),
    /// The submitted answer was accepted.
    AnswerAccepted(String),
    /// The submitted answer was rejected.
    AnswerRejected(String),
    /// The turn owner ran out of time and is eliminated.
    TurnExpired(TurnExpiredPayload),
    /// The game ended; carries the winner's id.
    GameOver(ClientId),
    /// A finished game was restarted.
    RestartGame,
    /// The server is going away; terminal for this client.
    Shutdown,
}

impl ServerMessage {
    /// The wire name (`Type`) of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClientDetails(_) => "client_details",
            Self::ClientJoined(_) => "client_joined",
            Self::ClientLeft(_) => "client_left",
            Self::NameChange(_) => "name_change",
            Self::ClientsTurn(_) => "clients_turn",
            Self::AnswerPreview(_) => "answer_preview",
            Self::AnswerAccepted(_) => "answer_accepted",
            Self::AnswerRejected(_) => "answer_rejected",
            Self::TurnExpired(_) => "turn_expired",
            Self::GameOver(_) => "game_over",
            Self::RestartGame => "restart_game",
            Self::Shutdown => "shutdown",
        }
    }
}

// ── Decoding ────────────────────────────────────────────────────────

/// Result of decoding one inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A message this client understands.
    Message(ServerMessage),
    /// A well-formed envelope whose `Type` this client does not know.
    Unrecognized(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Content", default)]
    content: serde_json::Value,
}

/// Decode one inbound envelope.
///
/// # Errors
///
/// - [`WordcraftError::Serialization`] if `text` is not a JSON envelope with a
///   string `Type`.
/// - [`WordcraftError::MalformedPayload`] if `Type` is known but `Content`
///   does not have the expected shape.
///
/// Unknown `Type` values are **not** errors; they yield
/// [`Inbound::Unrecognized`].
pub fn decode_server_message(text: &str) -> Result<Inbound> {
    let Envelope { kind, content } = serde_json::from_str(text)?;

    let message = match kind.as_str() {
        "client_details" => ServerMessage::ClientDetails(Box::new(payload(&kind, content)?)),
        "client_joined" => ServerMessage::ClientJoined(payload(&kind, content)?),
        "client_left" => ServerMessage::ClientLeft(payload(&kind, content)?),
        "name_change" => ServerMessage::NameChange(payload(&kind, content)?),
        "clients_turn" => ServerMessage::ClientsTurn(payload(&kind, content)?),
        "answer_preview" => ServerMessage::AnswerPreview(payload(&kind, content)?),
        "answer_accepted" => ServerMessage::AnswerAccepted(payload(&kind, content)?),
        "answer_rejected" => ServerMessage::AnswerRejected(payload(&kind, content)?),
        "turn_expired" => ServerMessage::TurnExpired(payload(&kind, content)?),
        "game_over" => ServerMessage::GameOver(payload(&kind, content)?),
        "restart_game" => ServerMessage::RestartGame,
        "shutdown" => ServerMessage::Shutdown,
        _ => return Ok(Inbound::Unrecognized(kind)),
    };

    Ok(Inbound::Message(message))
}

fn payload<T: DeserializeOwned>(kind: &str, content: serde_json::Value) -> Result<T> {
    serde_json::from_value(content).map_err(|source| WordcraftError::MalformedPayload {
        kind: kind.to_string(),
        source,
    })
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

    #[test]
    fn kind_matches_serialized_type() {
        let messages = [
            ServerMessage::ClientLeft(3),
            ServerMessage::AnswerPreview("ca".into()),
            ServerMessage::GameOver(2),
            ServerMessage::RestartGame,
            ServerMessage::Shutdown,
        ];
        for msg in messages {
            let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
            assert_eq!(json["Type"], msg.kind());
        }
    }

    #[test]
    fn game_phase_rejects_unknown_status() {
        let err = serde_json::from_str::<GamePhase>("7").unwrap_err();
        assert!(err.to_string().contains("unknown game status 7"));
    }

    #[test]
    fn unit_message_decodes_with_or_without_content() {
        for text in [
            r#"{"Type":"restart_game"}"#,
            r#"{"Type":"restart_game","Content":null}"#,
        ] {
            assert_eq!(
                decode_server_message(text).unwrap(),
                Inbound::Message(ServerMessage::RestartGame)
            );
        }
    }
}
