//! Public call API
//!
//! [`CallGateway`] is what applications talk to. It owns a
//! [`CallEngine`](crate::state_machine::CallEngine), checks permissions and
//! argument shape, and maps internal errors onto the API error kinds.
//!
//! The gateway is split by concern:
//! - `gateway.rs` - construction, call control, events and signalling ingress
//! - `conference.rs` - conference operations and queries
//! - `media.rs` - DTMF, audio routing, video and status queries
//! - `settings.rs` - supplementary services, IMS switch and VoNR

mod conference;
pub mod gateway;
mod media;
pub mod permissions;
mod settings;

pub use gateway::{CallGateway, DialOutcome, MakeCallOutcome};
pub use permissions::{Permission, PermissionSet};
