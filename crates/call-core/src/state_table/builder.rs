use super::types::{EventType, MasterStateTable, StateKey, Transition};
use crate::types::CallState;

/// Incrementally assembles a [`MasterStateTable`]
pub struct StateTableBuilder {
    table: MasterStateTable,
}

impl StateTableBuilder {
    pub fn new() -> Self {
        Self {
            table: MasterStateTable::new(),
        }
    }

    pub fn add_transition(&mut self, state: CallState, event: EventType, transition: Transition) -> &mut Self {
        self.table.insert(StateKey { state, event }, transition);
        self
    }

    /// Shorthand for an edge that only changes state
    pub fn add_state_change(&mut self, state: CallState, event: EventType, next_state: CallState) -> &mut Self {
        self.add_transition(state, event, Transition::to(next_state))
    }

    /// Event accepted in `state` without any effect
    pub fn add_noop(&mut self, state: CallState, event: EventType) -> &mut Self {
        self.add_transition(state, event, Transition::noop())
    }

    pub fn build(self) -> MasterStateTable {
        self.table
    }
}
