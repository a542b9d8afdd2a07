//! Event-sourced projection of lobby state.
//!
//! [`apply`] is a pure reducer: it takes the current [`LobbyState`] and one
//! [`ServerMessage`] and returns the next state plus the [`Effect`]s the
//! presentation layer should perform. It never performs I/O and never fails;
//! events whose preconditions do not hold leave the state untouched.
//!
//! [`Projection`] wraps the reducer with the "not yet synchronized" state a
//! client is in between connecting (or losing its connection) and receiving
//! the next `client_details` snapshot.

use tracing::debug;

use crate::protocol::{
    ClientDetailsPayload, ClientId, ClientJoinedPayload, ClientsTurnPayload, Millis,
    NameChangePayload, ServerMessage, TurnExpiredPayload,
};

pub use crate::protocol::GamePhase;

/// Number of characters of the answer preview shown before truncation.
pub const PREVIEW_DISPLAY_CHARS: usize = 20;

/// Marker appended to a truncated answer preview.
pub const PREVIEW_ELLIPSIS: &str = "...";

/// A player present in the lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ClientId,
    pub display_name: String,
    pub icon_name: String,
    /// `false` once eliminated in the current game.
    pub alive: bool,
}

/// The current turn. Only meaningful while the phase is
/// [`GamePhase::InProgress`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TurnState {
    pub owner_id: Option<ClientId>,
    pub challenge: String,
    /// Absolute deadline on the server clock.
    pub deadline: Option<Millis>,
    /// Full, untruncated live answer of the turn owner.
    pub answer_preview: String,
    /// Words suggested after the last elimination of this turn.
    pub suggestions: Vec<String>,
}

impl TurnState {
    /// The answer preview as it should be displayed: at most
    /// [`PREVIEW_DISPLAY_CHARS`] characters, followed by [`PREVIEW_ELLIPSIS`]
    /// when something was cut off.
    pub fn preview_display(&self) -> String {
        if self.answer_preview.chars().count() <= PREVIEW_DISPLAY_CHARS {
            return self.answer_preview.clone();
        }
        let mut shown: String = self
            .answer_preview
            .chars()
            .take(PREVIEW_DISPLAY_CHARS)
            .collect();
        shown.push_str(PREVIEW_ELLIPSIS);
        shown
    }
}

/// The local view of a lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyState {
    /// Our own participant id.
    pub my_id: ClientId,
    pub phase: GamePhase,
    /// Participants in arrival order; `id` is unique.
    pub participants: Vec<Participant>,
    pub turn: TurnState,
    pub winner_name: Option<String>,
    /// Credential that came with the last snapshot.
    pub reconnect_token: String,
}

impl LobbyState {
    /// Build the state described by a snapshot, discarding nothing but
    /// duplicate participant ids (first occurrence wins).
    pub fn from_snapshot(snapshot: &ClientDetailsPayload) -> Self {
        let mut participants: Vec<Participant> = Vec::with_capacity(snapshot.clients.len());
        for client in &snapshot.clients {
            if participants.iter().any(|p| p.id == client.id) {
                debug!(id = client.id, "snapshot lists participant twice; keeping first");
                continue;
            }
            participants.push(Participant {
                id: client.id,
                display_name: client.display_name.clone(),
                icon_name: client.icon_name.clone(),
                alive: client.alive,
            });
        }

        let turn = if snapshot.status == GamePhase::InProgress {
            TurnState {
                owner_id: (snapshot.current_turn_id != 0).then_some(snapshot.current_turn_id),
                challenge: snapshot.current_challenge.clone(),
                deadline: (snapshot.turn_end != 0).then_some(snapshot.turn_end),
                answer_preview: snapshot.current_answer_prev.clone(),
                suggestions: Vec::new(),
            }
        } else {
            TurnState::default()
        };

        Self {
            my_id: snapshot.client_id,
            phase: snapshot.status,
            participants,
            turn,
            winner_name: (!snapshot.winners_name.is_empty())
                .then(|| snapshot.winners_name.clone()),
            reconnect_token: snapshot.reconnect_token.clone(),
        }
    }

    pub fn participant(&self, id: ClientId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    fn participant_mut(&mut self, id: ClientId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    /// Our own participant entry, if the server listed it.
    pub fn me(&self) -> Option<&Participant> {
        self.participant(self.my_id)
    }

    pub fn is_my_turn(&self) -> bool {
        self.phase == GamePhase::InProgress && self.turn.owner_id == Some(self.my_id)
    }

    pub fn alive_count(&self) -> usize {
        self.participants.iter().filter(|p| p.alive).count()
    }
}

/// Externally observable consequence of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    PlayJoinSound { participant_id: ClientId },
    /// A new turn started; restart the countdown towards `deadline`.
    ResetCountdown { deadline: Millis },
    /// It is our turn: focus the answer input.
    FocusInput,
    PlayAcceptedSound { answer: String },
    ShakeInput { owner_id: ClientId },
    PlayEliminatedSound { participant_id: ClientId },
    /// We were eliminated: hide and unfocus the answer input.
    ClearInputFocus,
    StopCountdown,
    ClearEliminationMarkers,
    /// The server is shutting down: tell the user and navigate away.
    NotifyShutdown,
}

/// Apply one server event to `state`.
///
/// Events whose preconditions are not met (wrong phase, unknown participant,
/// duplicate join) return the state unchanged with no effects.
pub fn apply(state: LobbyState, message: &ServerMessage) -> (LobbyState, Vec<Effect>) {
    let mut next = state;
    let mut effects = Vec::new();

    match message {
        ServerMessage::ClientDetails(snapshot) => {
            return (LobbyState::from_snapshot(snapshot), effects);
        }
        ServerMessage::ClientJoined(joined) => on_client_joined(&mut next, joined, &mut effects),
        ServerMessage::ClientLeft(id) => {
            let before = next.participants.len();
            next.participants.retain(|p| p.id != *id);
            if next.participants.len() == before {
                debug!(id, "client_left for absent participant ignored");
            }
        }
        ServerMessage::NameChange(change) => on_name_change(&mut next, change),
        ServerMessage::ClientsTurn(turn) => on_clients_turn(&mut next, turn, &mut effects),
        ServerMessage::AnswerPreview(preview) => {
            if in_progress(&next, message) {
                next.turn.answer_preview.clone_from(preview);
            }
        }
        ServerMessage::AnswerAccepted(answer) => {
            if in_progress(&next, message) {
                effects.push(Effect::PlayAcceptedSound {
                    answer: answer.clone(),
                });
            }
        }
        ServerMessage::AnswerRejected(_) => {
            if in_progress(&next, message) {
                if let Some(owner_id) = next.turn.owner_id {
                    effects.push(Effect::ShakeInput { owner_id });
                }
            }
        }
        ServerMessage::TurnExpired(expired) => on_turn_expired(&mut next, expired, &mut effects),
        ServerMessage::GameOver(winner_id) => {
            if in_progress(&next, message) {
                next.phase = GamePhase::Over;
                next.winner_name = next.participant(*winner_id).map(|p| p.display_name.clone());
                next.turn = TurnState::default();
                effects.push(Effect::StopCountdown);
            }
        }
        ServerMessage::RestartGame => {
            if next.phase == GamePhase::Over {
                next.phase = GamePhase::InProgress;
                next.winner_name = None;
                next.turn = TurnState::default();
                for participant in &mut next.participants {
                    participant.alive = true;
                }
                effects.push(Effect::ClearEliminationMarkers);
            } else {
                debug!(phase = ?next.phase, "restart_game outside of OVER ignored");
            }
        }
        ServerMessage::Shutdown => effects.push(Effect::NotifyShutdown),
    }

    (next, effects)
}

fn in_progress(state: &LobbyState, message: &ServerMessage) -> bool {
    let ok = state.phase == GamePhase::InProgress;
    if !ok {
        debug!(kind = message.kind(), phase = ?state.phase, "event ignored outside of a game");
    }
    ok
}

fn on_client_joined(state: &mut LobbyState, joined: &ClientJoinedPayload, effects: &mut Vec<Effect>) {
    if state.participant(joined.client_id).is_some() {
        debug!(id = joined.client_id, "duplicate client_joined ignored");
        return;
    }
    state.participants.push(Participant {
        id: joined.client_id,
        display_name: joined.display_name.clone(),
        icon_name: joined.icon_name.clone(),
        alive: true,
    });
    effects.push(Effect::PlayJoinSound {
        participant_id: joined.client_id,
    });
}

fn on_name_change(state: &mut LobbyState, change: &NameChangePayload) {
    match state.participant_mut(change.client_id) {
        Some(participant) => participant.display_name.clone_from(&change.new_display_name),
        None => debug!(id = change.client_id, "name_change for absent participant ignored"),
    }
}

fn on_clients_turn(state: &mut LobbyState, turn: &ClientsTurnPayload, effects: &mut Vec<Effect>) {
    if state.phase == GamePhase::Over {
        debug!(owner = turn.client_id, "clients_turn after game over ignored");
        return;
    }
    let deadline = turn.turn_end.filter(|&end| end != 0);
    state.phase = GamePhase::InProgress;
    state.turn = TurnState {
        owner_id: Some(turn.client_id),
        challenge: turn.challenge.clone(),
        deadline,
        answer_preview: String::new(),
        suggestions: Vec::new(),
    };
    match deadline {
        Some(deadline) => effects.push(Effect::ResetCountdown { deadline }),
        None => debug!(owner = turn.client_id, "clients_turn without a deadline"),
    }
    if turn.client_id == state.my_id {
        effects.push(Effect::FocusInput);
    }
}

fn on_turn_expired(state: &mut LobbyState, expired: &TurnExpiredPayload, effects: &mut Vec<Effect>) {
    let eliminated = expired.eliminated_client_id;
    if state.phase != GamePhase::InProgress || state.turn.owner_id != Some(eliminated) {
        debug!(
            eliminated,
            owner = ?state.turn.owner_id,
            phase = ?state.phase,
            "turn_expired does not match the current turn; ignored"
        );
        return;
    }
    state.turn.suggestions.clone_from(&expired.suggestions);
    match state.participant_mut(eliminated) {
        Some(participant) => {
            participant.alive = false;
            effects.push(Effect::PlayEliminatedSound {
                participant_id: eliminated,
            });
        }
        None => debug!(eliminated, "turn owner already left; nothing to mark"),
    }
    if eliminated == state.my_id {
        effects.push(Effect::ClearInputFocus);
    }
}

// ── Projection ──────────────────────────────────────────────────────

/// The projection as held by the event loop: either waiting for a snapshot
/// or synchronized.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    /// No snapshot has been received on the current connection.
    #[default]
    Uninitialized,
    /// Synchronized with the server.
    Ready(LobbyState),
}

impl Projection {
    /// Apply one event.
    ///
    /// A snapshot always (re)initializes the projection. Until one arrives,
    /// every other event is dropped, except `shutdown` which still reports
    /// [`Effect::NotifyShutdown`].
    pub fn apply(self, message: &ServerMessage) -> (Self, Vec<Effect>) {
        match (self, message) {
            (_, ServerMessage::ClientDetails(snapshot)) => {
                (Self::Ready(LobbyState::from_snapshot(snapshot)), Vec::new())
            }
            (Self::Ready(state), _) => {
                let (next, effects) = apply(state, message);
                (Self::Ready(next), effects)
            }
            (Self::Uninitialized, ServerMessage::Shutdown) => {
                (Self::Uninitialized, vec![Effect::NotifyShutdown])
            }
            (Self::Uninitialized, _) => {
                debug!(kind = message.kind(), "event before snapshot dropped");
                (Self::Uninitialized, Vec::new())
            }
        }
    }

    pub fn state(&self) -> Option<&LobbyState> {
        match self {
            Self::Ready(state) => Some(state),
            Self::Uninitialized => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
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

    fn turn_with_preview(preview: &str) -> TurnState {
        TurnState {
            answer_preview: preview.into(),
            ..TurnState::default()
        }
    }

    #[test]
    fn short_preview_is_shown_verbatim() {
        assert_eq!(turn_with_preview("cat").preview_display(), "cat");
        let exact = "a".repeat(PREVIEW_DISPLAY_CHARS);
        assert_eq!(turn_with_preview(&exact).preview_display(), exact);
    }

    #[test]
    fn long_preview_is_truncated_for_display_only() {
        let long = "abcdefghijklmnopqrstuvwxyz";
        let turn = turn_with_preview(long);
        assert_eq!(turn.preview_display(), "abcdefghijklmnopqrst...");
        assert_eq!(turn.answer_preview, long);
    }

    #[test]
    fn preview_truncation_counts_characters_not_bytes() {
        let accented = "é".repeat(25);
        let shown = turn_with_preview(&accented).preview_display();
        assert_eq!(shown.chars().count(), PREVIEW_DISPLAY_CHARS + PREVIEW_ELLIPSIS.len());
    }

    #[test]
    fn snapshot_outside_game_has_no_turn() {
        let snapshot = ClientDetailsPayload {
            client_id: 1,
            status: GamePhase::Waiting,
            current_turn_id: 4,
            turn_end: 99,
            ..ClientDetailsPayload::default()
        };
        let state = LobbyState::from_snapshot(&snapshot);
        assert_eq!(state.turn, TurnState::default());
    }

    #[test]
    fn uninitialized_projection_drops_events() {
        let (projection, effects) = Projection::Uninitialized.apply(&ServerMessage::ClientLeft(1));
        assert_eq!(projection, Projection::Uninitialized);
        assert!(effects.is_empty());

        let (projection, effects) = Projection::Uninitialized.apply(&ServerMessage::Shutdown);
        assert!(!projection.is_ready());
        assert_eq!(effects, vec![Effect::NotifyShutdown]);
    }
}
