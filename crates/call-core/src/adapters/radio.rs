use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{CallError, CallResult};
use crate::events::{CallSessionEventId, VideoRequestResult};
use crate::services::audio::AudioDevice;
use crate::services::supplementary::{
    CallRestrictionInfo, CallRestrictionType, CallTransferInfo, CallTransferResult, CallTransferType,
    CallWaitingStatus, RestrictionStatus, VoNrState,
};
use crate::types::{
    CallId, CallType, DialScene, DisconnectedReason, ImsCallMode, IncomingCallInfo, SlotId, VideoState,
};
use crate::utils::mmi::{MmiCode, MmiCodeInfo};

/// Everything the radio needs to place a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialRequest {
    pub call_id: CallId,
    pub number: String,
    pub account_id: SlotId,
    pub call_type: CallType,
    pub video_state: VideoState,
    pub dial_scene: DialScene,
    pub is_emergency: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceTarget {
    Preview,
    Display,
}

/// Asynchronous outcome the radio reports for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalEvent {
    NetworkAccepted,
    RemoteAnswered,
    /// Normal network release
    Released(DisconnectedReason),
    /// Fatal signalling error (radio failure, SIM removal)
    Abort(DisconnectedReason),
    ImsCallModeResponse {
        mode: ImsCallMode,
        result: VideoRequestResult,
    },
    Session(CallSessionEventId),
    PeerDimensions { width: u32, height: u32 },
    CameraCapabilities { width: u32, height: u32 },
}

/// Everything the radio reports to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RadioSignal {
    Call { call_id: CallId, event: SignalEvent },
    Incoming(IncomingCallInfo),
    MmiResult(MmiCodeInfo),
    AudioDeviceConnected(AudioDevice),
    AudioDeviceDisconnected(AudioDevice),
}

impl RadioSignal {
    pub fn call(call_id: CallId, event: SignalEvent) -> Self {
        RadioSignal::Call { call_id, event }
    }
}

/// The native call service.
///
/// A returned error means the request never reached the network; the engine
/// reports it as `ServiceUnavailable` and commits nothing. Failures after the
/// network accepted a request arrive later as [`RadioSignal`]s.
#[async_trait]
pub trait RadioLink: Send + Sync {
    async fn dial(&self, request: &DialRequest) -> CallResult<()>;
    async fn answer(&self, call_id: CallId, video_state: VideoState) -> CallResult<()>;
    async fn reject(&self, call_id: CallId, message: Option<&str>) -> CallResult<()>;
    async fn hang_up(&self, call_id: CallId) -> CallResult<()>;
    async fn hold(&self, call_id: CallId) -> CallResult<()>;
    async fn unhold(&self, call_id: CallId) -> CallResult<()>;
    async fn switch(&self, active: CallId, held: CallId) -> CallResult<()>;

    async fn combine(&self, main: CallId, members: &[CallId]) -> CallResult<()>;
    async fn separate(&self, call_id: CallId) -> CallResult<()>;
    async fn kick_out(&self, call_id: CallId) -> CallResult<()>;

    async fn start_dtmf(&self, call_id: CallId, tone: char) -> CallResult<()>;
    async fn stop_dtmf(&self, call_id: CallId) -> CallResult<()>;
    async fn send_post_dial(&self, call_id: CallId, digits: &str) -> CallResult<()>;

    /// Result arrives as [`RadioSignal::MmiResult`]
    async fn send_mmi(&self, slot: SlotId, code: &MmiCode) -> CallResult<()>;

    async fn set_audio_route(&self, device: &AudioDevice) -> CallResult<()>;
    async fn set_mute(&self, muted: bool) -> CallResult<()>;

    async fn get_call_waiting(&self, slot: SlotId) -> CallResult<CallWaitingStatus>;
    async fn set_call_waiting(&self, slot: SlotId, enabled: bool) -> CallResult<()>;
    async fn get_call_restriction(&self, slot: SlotId, kind: CallRestrictionType) -> CallResult<RestrictionStatus>;
    async fn set_call_restriction(&self, slot: SlotId, info: &CallRestrictionInfo) -> CallResult<()>;
    async fn set_restriction_password(
        &self,
        slot: SlotId,
        kind: CallRestrictionType,
        old_password: &str,
        new_password: &str,
    ) -> CallResult<()>;
    async fn get_call_transfer(&self, slot: SlotId, kind: CallTransferType) -> CallResult<CallTransferResult>;
    async fn set_call_transfer(&self, slot: SlotId, info: &CallTransferInfo) -> CallResult<()>;

    // IMS capabilities; radios without IMS keep the defaults

    async fn update_ims_call_mode(&self, _call_id: CallId, _mode: ImsCallMode) -> CallResult<()> {
        Err(CallError::unsupported("IMS call mode is not supported by this radio"))
    }

    async fn cancel_call_upgrade(&self, _call_id: CallId) -> CallResult<()> {
        Err(CallError::unsupported("IMS call upgrade is not supported by this radio"))
    }

    async fn control_camera(&self, _call_id: CallId, _camera_id: &str) -> CallResult<()> {
        Err(CallError::unsupported("video calls are not supported by this radio"))
    }

    async fn set_surface(&self, _call_id: CallId, _target: SurfaceTarget, _surface_id: &str) -> CallResult<()> {
        Err(CallError::unsupported("video calls are not supported by this radio"))
    }

    async fn set_device_direction(&self, _call_id: CallId, _rotation: u16) -> CallResult<()> {
        Err(CallError::unsupported("video calls are not supported by this radio"))
    }

    async fn set_camera_zoom(&self, _zoom_ratio: f32) -> CallResult<()> {
        Err(CallError::unsupported("video calls are not supported by this radio"))
    }

    async fn set_ims_switch(&self, _slot: SlotId, _enabled: bool) -> CallResult<()> {
        Err(CallError::unsupported("IMS is not supported by this radio"))
    }

    async fn get_ims_switch(&self, _slot: SlotId) -> CallResult<bool> {
        Err(CallError::unsupported("IMS is not supported by this radio"))
    }

    async fn set_vonr_state(&self, _slot: SlotId, _state: VoNrState) -> CallResult<()> {
        Err(CallError::unsupported("VoNR is not supported by this radio"))
    }

    async fn get_vonr_state(&self, _slot: SlotId) -> CallResult<VoNrState> {
        Err(CallError::unsupported("VoNR is not supported by this radio"))
    }
}
