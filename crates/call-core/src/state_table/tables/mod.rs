mod common;
mod incoming;
mod outgoing;

pub use common::add_common_transitions;
pub use incoming::add_incoming_transitions;
pub use outgoing::add_outgoing_transitions;
