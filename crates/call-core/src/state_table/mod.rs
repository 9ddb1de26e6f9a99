//! Call state transition table
//!
//! Every legal state change of a call is an entry in [`MASTER_TABLE`], keyed by
//! the current state and the named event. The engine looks transitions up here
//! and rejects anything missing with `InvalidState`.

pub mod builder;
pub mod tables;
pub mod types;

pub use builder::StateTableBuilder;
pub use types::*;

use lazy_static::lazy_static;
use std::sync::Arc;

lazy_static! {
    /// The master state table - single source of truth for all transitions
    pub static ref MASTER_TABLE: Arc<MasterStateTable> = Arc::new(build_master_table());
}

/// Build the complete master state table
pub fn build_master_table() -> MasterStateTable {
    let mut builder = StateTableBuilder::new();
    tables::add_outgoing_transitions(&mut builder);
    tables::add_incoming_transitions(&mut builder);
    tables::add_common_transitions(&mut builder);
    let table = builder.build();

    if let Err(errors) = table.validate() {
        tracing::error!("Invalid call state table: {:?}", errors);
    } else {
        tracing::debug!("Built call state table with {} transitions", table.transition_count());
    }
    table
}
