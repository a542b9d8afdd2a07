#![no_main]

use libfuzzer_sys::fuzz_target;
use wordcraft_client::protocol::{decode_server_message, Inbound};
use wordcraft_client::{GamePhase, Projection};

// One envelope per line, folded over a fresh projection.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut projection = Projection::Uninitialized;
    for line in text.lines() {
        let Ok(Inbound::Message(message)) = decode_server_message(line) else {
            continue;
        };
        projection = projection.apply(&message).0;

        if let Some(state) = projection.state() {
            let mut ids: Vec<_> = state.participants.iter().map(|p| p.id).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), state.participants.len(), "duplicate participant id");
            if state.phase != GamePhase::InProgress {
                assert!(state.turn.owner_id.is_none(), "turn owner outside of a game");
            }
        }
    }
});
