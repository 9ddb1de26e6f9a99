use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::types::CallState;

/// Key for looking up transitions in the state table
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct StateKey {
    pub state: CallState,
    pub event: EventType,
}

/// Named edges of the call state machine.
///
/// Commands issued through the gateway and signals reported by the radio are
/// both expressed as an `EventType`; the cause carried by `Released`/`Abort`
/// travels alongside the event and is not part of the lookup key.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum EventType {
    // Outgoing call setup
    Dial,
    NetworkAccepted,
    RemoteAnswered,

    // Incoming call setup
    IncomingRing,
    WaitingIndication,
    Answer,
    Reject,

    // Established call control
    Hold,
    Unhold,

    // Teardown
    Hangup,
    Released,
    Abort,
}

impl EventType {
    pub const ALL: [EventType; 12] = [
        EventType::Dial,
        EventType::NetworkAccepted,
        EventType::RemoteAnswered,
        EventType::IncomingRing,
        EventType::WaitingIndication,
        EventType::Answer,
        EventType::Reject,
        EventType::Hold,
        EventType::Unhold,
        EventType::Hangup,
        EventType::Released,
        EventType::Abort,
    ];

    /// Get the event type name for logging
    pub fn type_name(&self) -> &'static str {
        match self {
            EventType::Dial => "Dial",
            EventType::NetworkAccepted => "NetworkAccepted",
            EventType::RemoteAnswered => "RemoteAnswered",
            EventType::IncomingRing => "IncomingRing",
            EventType::WaitingIndication => "WaitingIndication",
            EventType::Answer => "Answer",
            EventType::Reject => "Reject",
            EventType::Hold => "Hold",
            EventType::Unhold => "Unhold",
            EventType::Hangup => "Hangup",
            EventType::Released => "Released",
            EventType::Abort => "Abort",
        }
    }

    /// Events originated by the network rather than by an API caller
    pub fn is_signal(&self) -> bool {
        matches!(
            self,
            EventType::NetworkAccepted
                | EventType::RemoteAnswered
                | EventType::IncomingRing
                | EventType::WaitingIndication
                | EventType::Released
                | EventType::Abort
        )
    }
}

/// Transition definition - what happens when an event occurs in a state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Next state (if changing)
    pub next_state: Option<CallState>,

    /// Events to publish after transition
    pub publish_events: Vec<EventTemplate>,
}

impl Transition {
    pub fn to(next_state: CallState) -> Self {
        let mut publish_events = vec![EventTemplate::StateChanged];
        if next_state == CallState::Disconnected {
            publish_events.push(EventTemplate::DisconnectedCause);
        }
        Self {
            next_state: Some(next_state),
            publish_events,
        }
    }

    /// Accepted without changing state or publishing anything
    pub fn noop() -> Self {
        Self {
            next_state: None,
            publish_events: vec![],
        }
    }

    pub fn is_noop(&self) -> bool {
        self.next_state.is_none()
    }
}

/// Event templates for publishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTemplate {
    /// `callDetailsChange` with the committed record
    StateChanged,
    /// `callDisconnectedCause` with the record's disconnect cause
    DisconnectedCause,
}

/// States that must always have exit transitions
const CORE_STATES_REQUIRING_EXITS: &[CallState] = &[
    CallState::Idle,
    CallState::Dialing,
    CallState::Alerting,
    CallState::Incoming,
    CallState::Waiting,
    CallState::Active,
    CallState::Holding,
    CallState::Disconnecting,
];

/// Master state table containing all transitions
#[derive(Debug, Default)]
pub struct MasterStateTable {
    transitions: HashMap<StateKey, Transition>,
}

/// Type alias for external use
pub type StateTable = MasterStateTable;

impl MasterStateTable {
    pub fn new() -> Self {
        Self {
            transitions: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: StateKey, transition: Transition) {
        self.transitions.insert(key, transition);
    }

    pub fn get(&self, key: &StateKey) -> Option<&Transition> {
        self.transitions.get(key)
    }

    pub fn get_transition(&self, state: CallState, event: EventType) -> Option<&Transition> {
        self.get(&StateKey { state, event })
    }

    pub fn has_transition(&self, state: CallState, event: EventType) -> bool {
        self.transitions.contains_key(&StateKey { state, event })
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// All edges, sorted by state then event name, for printing
    pub fn entries(&self) -> Vec<(StateKey, &Transition)> {
        let mut entries: Vec<_> = self.transitions.iter().map(|(k, t)| (*k, t)).collect();
        entries.sort_by(|(a, _), (b, _)| {
            a.state
                .cmp(&b.state)
                .then_with(|| a.event.type_name().cmp(b.event.type_name()))
        });
        entries
    }

    /// Collect all states referenced in this state table
    pub fn collect_used_states(&self) -> HashSet<CallState> {
        let mut states = HashSet::new();
        for (key, transition) in &self.transitions {
            states.insert(key.state);
            if let Some(next_state) = transition.next_state {
                states.insert(next_state);
            }
        }
        states
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for state in CORE_STATES_REQUIRING_EXITS {
            let has_exit = self
                .transitions
                .iter()
                .any(|(k, t)| k.state == *state && t.next_state.is_some());
            if !has_exit {
                errors.push(format!("Core state {:?} has no exit transitions", state));
            }
        }

        // DISCONNECTED is terminal
        for (key, transition) in &self.transitions {
            if key.state == CallState::Disconnected && transition.next_state.is_some() {
                errors.push(format!(
                    "Terminal state DISCONNECTED has an outgoing {} edge",
                    key.event.type_name()
                ));
            }
        }

        // Every non-terminal state must be able to abort
        for state in CallState::ALL {
            if state.is_terminal() || state == CallState::Idle {
                continue;
            }
            if self.get_transition(state, EventType::Abort).and_then(|t| t.next_state)
                != Some(CallState::Disconnected)
            {
                errors.push(format!("State {:?} has no abort edge", state));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
