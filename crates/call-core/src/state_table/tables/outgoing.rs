use crate::state_table::{EventType, StateTableBuilder};
use crate::types::CallState;

/// Add mobile-originated call setup transitions
pub fn add_outgoing_transitions(builder: &mut StateTableBuilder) {
    // Idle -> Dialing: radio accepted the dial request
    builder.add_state_change(CallState::Idle, EventType::Dial, CallState::Dialing);

    // Dialing -> Alerting: network is ringing the remote party
    builder.add_state_change(CallState::Dialing, EventType::NetworkAccepted, CallState::Alerting);

    // Remote answered; some networks never report alerting
    builder.add_state_change(CallState::Dialing, EventType::RemoteAnswered, CallState::Active);
    builder.add_state_change(CallState::Alerting, EventType::RemoteAnswered, CallState::Active);
}
