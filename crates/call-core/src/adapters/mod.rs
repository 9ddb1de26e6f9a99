// Adapters for the radio stack and the ability host
pub mod ability;
pub mod loopback;
pub mod radio;

// Re-export adapters
pub use ability::{AbilityHost, AbilityRequest, RecordingAbilityHost};
pub use loopback::{LoopbackRadio, RadioCommand};
pub use radio::{DialRequest, RadioLink, RadioSignal, SignalEvent, SurfaceTarget};
