//! Device-wide services that live alongside the call state machine:
//! audio routing and carrier supplementary services.

pub mod audio;
pub mod supplementary;

pub use audio::{AudioDevice, AudioDeviceInfo, AudioDeviceType, AudioRouter};
pub use supplementary::*;
