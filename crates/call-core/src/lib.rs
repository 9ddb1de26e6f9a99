//! # Telcall-Core
//!
//! Call-session engine behind the telephony call API.
//!
//! This crate provides:
//! - The call record store, keyed by call id, with atomic single and
//!   multi-record commits
//! - The call state machine: a declarative transition table and the engine
//!   that drives records through it, including conferences and hold/switch
//!   of whole call units
//! - Event dispatch with per-subscription delivery queues
//! - The command gateway applications talk to, with permission and
//!   argument validation
//! - MMI code recognition, dial string handling, supplementary service
//!   validation and audio routing
//!
//! ## Architecture
//!
//! The gateway validates and forwards commands to the engine. The engine is
//! the only writer of the store; it talks to the network through a
//! [`RadioLink`] and reports every committed change through the
//! [`EventDispatcher`]. Asynchronous network outcomes come back as
//! [`RadioSignal`]s.

pub mod adapters;
pub mod api;
pub mod call_store;
pub mod config;
pub mod errors;
pub mod events;
pub mod services;
pub mod state_machine;
pub mod state_table;
pub mod types;
pub mod utils;

pub use adapters::{AbilityHost, AbilityRequest, LoopbackRadio, RadioLink, RadioSignal, RecordingAbilityHost, SignalEvent};
pub use api::{CallGateway, DialOutcome, MakeCallOutcome, Permission, PermissionSet};
pub use call_store::{CallStore, RemoveOutcome, StoreStats};
pub use config::CallManagerConfig;
pub use errors::{CallError, CallResult};
pub use events::{CallEvent, CallEventHandler, EventDispatcher, EventKind, EventSubscriber, SubscriptionId};
pub use state_machine::CallEngine;
pub use types::{
    CallDirection, CallId, CallRecord, CallState, CallType, ConferenceState, DialCallOptions, DisconnectedReason,
    ImsCallMode, IncomingCallInfo, RejectMessage, SlotId, TelCallState, VideoState,
};
