use crate::state_table::{EventType, StateTableBuilder};
use crate::types::CallState;

/// Add transitions shared by incoming and outgoing calls
pub fn add_common_transitions(builder: &mut StateTableBuilder) {
    builder.add_state_change(CallState::Active, EventType::Hold, CallState::Holding);
    builder.add_state_change(CallState::Holding, EventType::Unhold, CallState::Active);

    // Hangup is legal from every live state, including a dial not yet alerting
    for state in [
        CallState::Dialing,
        CallState::Alerting,
        CallState::Incoming,
        CallState::Waiting,
        CallState::Active,
        CallState::Holding,
    ] {
        builder.add_state_change(state, EventType::Hangup, CallState::Disconnecting);
    }

    // A repeated hangup succeeds without doing anything
    builder.add_noop(CallState::Disconnecting, EventType::Hangup);
    builder.add_noop(CallState::Disconnected, EventType::Hangup);

    // Network release and fatal signalling errors end any non-terminal call
    for state in [
        CallState::Idle,
        CallState::Dialing,
        CallState::Alerting,
        CallState::Incoming,
        CallState::Waiting,
        CallState::Active,
        CallState::Holding,
        CallState::Disconnecting,
    ] {
        builder.add_state_change(state, EventType::Released, CallState::Disconnected);
        builder.add_state_change(state, EventType::Abort, CallState::Disconnected);
    }

    // Late release reports for a call that already ended
    builder.add_noop(CallState::Disconnected, EventType::Released);
    builder.add_noop(CallState::Disconnected, EventType::Abort);
}
