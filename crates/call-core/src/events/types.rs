use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CallError;
use crate::services::audio::AudioDeviceInfo;
use crate::types::{CallId, CallRecord, DisconnectedDetails, ImsCallMode};
use crate::utils::mmi::MmiCodeInfo;

/// Event kinds a listener can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    CallDetailsChange,
    CallEventChange,
    CallDisconnectedCause,
    MmiCodeResult,
    AudioDeviceChange,
    PostDialDelay,
    ImsCallModeChange,
    CallSessionEvent,
    PeerDimensionsChange,
    CameraCapabilitiesChange,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::CallDetailsChange,
        EventKind::CallEventChange,
        EventKind::CallDisconnectedCause,
        EventKind::MmiCodeResult,
        EventKind::AudioDeviceChange,
        EventKind::PostDialDelay,
        EventKind::ImsCallModeChange,
        EventKind::CallSessionEvent,
        EventKind::PeerDimensionsChange,
        EventKind::CameraCapabilitiesChange,
    ];

    /// Name used by the `on`/`off` API
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CallDetailsChange => "callDetailsChange",
            EventKind::CallEventChange => "callEventChange",
            EventKind::CallDisconnectedCause => "callDisconnectedCause",
            EventKind::MmiCodeResult => "mmiCodeResult",
            EventKind::AudioDeviceChange => "audioDeviceChange",
            EventKind::PostDialDelay => "postDialDelay",
            EventKind::ImsCallModeChange => "imsCallModeChange",
            EventKind::CallSessionEvent => "callSessionEvent",
            EventKind::PeerDimensionsChange => "peerDimensionsChange",
            EventKind::CameraCapabilitiesChange => "cameraCapabilitiesChange",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = CallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| CallError::invalid_argument(format!("unknown event type '{}'", s)))
    }
}

/// Call ability events reported through `callEventChange`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallAbilityEventId {
    DialNoCarrier,
    InvalidFdnNumber,
    HoldCallFailed,
    SwapCallFailed,
    OttFunctionUnsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEventInfo {
    pub call_id: Option<CallId>,
    pub event_id: CallAbilityEventId,
    pub number: String,
}

/// Camera and surface lifecycle events of a video call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallSessionEventId {
    CameraFailure,
    CameraReady,
    ReleaseDisplaySurface,
    ReleasePreviewSurface,
}

/// Outcome of an IMS media mode change request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoRequestResult {
    Success,
    Fail,
    Invalid,
    Timeout,
    RejectedByRemote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImsCallModeInfo {
    pub call_id: CallId,
    pub mode: ImsCallMode,
    pub result: VideoRequestResult,
}

/// Notification delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallEvent {
    /// Snapshot of a record after a committed change
    CallDetailsChange(CallRecord),
    CallEventChange(CallEventInfo),
    CallDisconnectedCause {
        call_id: CallId,
        details: DisconnectedDetails,
    },
    MmiCodeResult(MmiCodeInfo),
    AudioDeviceChange(AudioDeviceInfo),
    /// Post-dial sequence hit a wait; `remaining` is sent on `post_dial_proceed`
    PostDialDelay {
        call_id: CallId,
        remaining: String,
    },
    ImsCallModeChange(ImsCallModeInfo),
    CallSessionEvent {
        call_id: CallId,
        event_id: CallSessionEventId,
    },
    PeerDimensionsChange {
        call_id: CallId,
        width: u32,
        height: u32,
    },
    CameraCapabilitiesChange {
        call_id: CallId,
        width: u32,
        height: u32,
    },
}

impl CallEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CallEvent::CallDetailsChange(_) => EventKind::CallDetailsChange,
            CallEvent::CallEventChange(_) => EventKind::CallEventChange,
            CallEvent::CallDisconnectedCause { .. } => EventKind::CallDisconnectedCause,
            CallEvent::MmiCodeResult(_) => EventKind::MmiCodeResult,
            CallEvent::AudioDeviceChange(_) => EventKind::AudioDeviceChange,
            CallEvent::PostDialDelay { .. } => EventKind::PostDialDelay,
            CallEvent::ImsCallModeChange(_) => EventKind::ImsCallModeChange,
            CallEvent::CallSessionEvent { .. } => EventKind::CallSessionEvent,
            CallEvent::PeerDimensionsChange { .. } => EventKind::PeerDimensionsChange,
            CallEvent::CameraCapabilitiesChange { .. } => EventKind::CameraCapabilitiesChange,
        }
    }

    /// Call the event is about, if it is call scoped
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            CallEvent::CallDetailsChange(record) => Some(record.call_id),
            CallEvent::CallEventChange(info) => info.call_id,
            CallEvent::CallDisconnectedCause { call_id, .. }
            | CallEvent::PostDialDelay { call_id, .. }
            | CallEvent::CallSessionEvent { call_id, .. }
            | CallEvent::PeerDimensionsChange { call_id, .. }
            | CallEvent::CameraCapabilitiesChange { call_id, .. } => Some(*call_id),
            CallEvent::ImsCallModeChange(info) => Some(info.call_id),
            CallEvent::MmiCodeResult(_) | CallEvent::AudioDeviceChange(_) => None,
        }
    }
}
