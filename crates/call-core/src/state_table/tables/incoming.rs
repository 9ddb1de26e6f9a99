use crate::state_table::{EventType, StateTableBuilder};
use crate::types::CallState;

/// Add mobile-terminated call setup transitions
pub fn add_incoming_transitions(builder: &mut StateTableBuilder) {
    builder.add_state_change(CallState::Idle, EventType::IncomingRing, CallState::Incoming);

    // A second call arrived while another one is up
    builder.add_state_change(CallState::Incoming, EventType::WaitingIndication, CallState::Waiting);

    for state in [CallState::Incoming, CallState::Waiting] {
        builder.add_state_change(state, EventType::Answer, CallState::Active);
        builder.add_state_change(state, EventType::Reject, CallState::Disconnected);
    }
}
