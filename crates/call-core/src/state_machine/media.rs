use tracing::{debug, info};

use super::{CallEngine, Effects};
use crate::adapters::radio::SurfaceTarget;
use crate::call_store::RecordGuard;
use crate::errors::{CallError, CallResult};
use crate::events::CallEvent;
use crate::services::audio::{AudioDevice, AudioDeviceInfo};
use crate::types::{CallId, CallState, CallType, ImsCallMode, TelCallState};
use crate::utils::number::is_dtmf_char;

pub const MIN_CAMERA_ZOOM: f32 = 0.1;
pub const MAX_CAMERA_ZOOM: f32 = 10.0;
const DEVICE_DIRECTIONS: [u16; 4] = [0, 90, 180, 270];

fn require_ims(guard: &RecordGuard) -> CallResult<()> {
    if guard.call_type != CallType::Ims {
        return Err(CallError::unsupported(format!(
            "call {} is {:?}; video control needs an IMS call",
            guard.call_id(),
            guard.call_type
        )));
    }
    if guard.state.is_ending() {
        return Err(CallError::invalid_state(format!("call {} is {}", guard.call_id(), guard.state)));
    }
    Ok(())
}

impl CallEngine {
    // ===== DTMF =====

    pub async fn start_dtmf(&self, call_id: CallId, tone: char) -> CallResult<()> {
        if !is_dtmf_char(tone) {
            return Err(CallError::invalid_argument(format!("'{}' is not a DTMF tone", tone)));
        }
        let mut guard = self.store.lock(call_id).await?;
        if guard.state != CallState::Active {
            return Err(CallError::invalid_state(format!(
                "cannot send DTMF on call {} in state {}",
                call_id, guard.state
            )));
        }
        self.radio
            .start_dtmf(call_id, tone)
            .await
            .map_err(|e| CallError::service_unavailable(format!("start DTMF failed: {}", e)))?;
        guard.dtmf_active = Some(tone);
        self.commit_publish(std::slice::from_mut(&mut guard), Effects::default())?;
        debug!("Call {} playing DTMF {}", call_id, tone);
        Ok(())
    }

    pub async fn stop_dtmf(&self, call_id: CallId) -> CallResult<()> {
        let mut guard = self.store.lock(call_id).await?;
        if guard.state != CallState::Active {
            return Err(CallError::invalid_state(format!(
                "cannot stop DTMF on call {} in state {}",
                call_id, guard.state
            )));
        }
        self.radio
            .stop_dtmf(call_id)
            .await
            .map_err(|e| CallError::service_unavailable(format!("stop DTMF failed: {}", e)))?;
        guard.dtmf_active = None;
        self.commit_publish(std::slice::from_mut(&mut guard), Effects::default())?;
        Ok(())
    }

    // ===== Video (IMS only) =====

    /// Ask the network for a new media mode. The outcome arrives as
    /// `imsCallModeChange`.
    pub async fn update_ims_call_mode(&self, call_id: CallId, mode: ImsCallMode) -> CallResult<()> {
        let guard = self.store.lock(call_id).await?;
        require_ims(&guard)?;
        if !guard.state.is_established() {
            return Err(CallError::invalid_state(format!(
                "call {} is {}; media mode changes need a connected call",
                call_id, guard.state
            )));
        }
        self.radio
            .update_ims_call_mode(call_id, mode)
            .await
            .map_err(unavailable("update IMS call mode"))?;
        info!("Requested {:?} for call {}", mode, call_id);
        Ok(())
    }

    pub async fn cancel_call_upgrade(&self, call_id: CallId) -> CallResult<()> {
        let guard = self.store.lock(call_id).await?;
        require_ims(&guard)?;
        self.radio
            .cancel_call_upgrade(call_id)
            .await
            .map_err(unavailable("cancel call upgrade"))
    }

    /// Open a camera for the call; an empty id closes it
    pub async fn control_camera(&self, call_id: CallId, camera_id: &str) -> CallResult<()> {
        let mut guard = self.store.lock(call_id).await?;
        require_ims(&guard)?;
        self.radio
            .control_camera(call_id, camera_id)
            .await
            .map_err(unavailable("control camera"))?;
        guard.video.camera_id = (!camera_id.is_empty()).then(|| camera_id.to_string());
        self.commit_publish(std::slice::from_mut(&mut guard), Effects::default())?;
        Ok(())
    }

    pub async fn set_preview_surface(&self, call_id: CallId, surface_id: &str) -> CallResult<()> {
        self.set_surface(call_id, SurfaceTarget::Preview, surface_id).await
    }

    pub async fn set_display_surface(&self, call_id: CallId, surface_id: &str) -> CallResult<()> {
        self.set_surface(call_id, SurfaceTarget::Display, surface_id).await
    }

    async fn set_surface(&self, call_id: CallId, target: SurfaceTarget, surface_id: &str) -> CallResult<()> {
        let mut guard = self.store.lock(call_id).await?;
        require_ims(&guard)?;
        self.radio
            .set_surface(call_id, target, surface_id)
            .await
            .map_err(unavailable("set surface"))?;
        let surface = (!surface_id.is_empty()).then(|| surface_id.to_string());
        match target {
            SurfaceTarget::Preview => guard.video.preview_surface = surface,
            SurfaceTarget::Display => guard.video.display_surface = surface,
        }
        self.commit_publish(std::slice::from_mut(&mut guard), Effects::default())?;
        Ok(())
    }

    /// Device rotation in degrees: 0, 90, 180 or 270
    pub async fn set_device_direction(&self, call_id: CallId, rotation: u16) -> CallResult<()> {
        if !DEVICE_DIRECTIONS.contains(&rotation) {
            return Err(CallError::invalid_argument(format!(
                "device direction {} is not one of {:?}",
                rotation, DEVICE_DIRECTIONS
            )));
        }
        let mut guard = self.store.lock(call_id).await?;
        require_ims(&guard)?;
        self.radio
            .set_device_direction(call_id, rotation)
            .await
            .map_err(unavailable("set device direction"))?;
        guard.video.device_direction = rotation;
        self.commit_publish(std::slice::from_mut(&mut guard), Effects::default())?;
        Ok(())
    }

    /// Zoom the camera of every IMS call that has one open
    pub async fn set_camera_zoom(&self, zoom_ratio: f32) -> CallResult<()> {
        if !(MIN_CAMERA_ZOOM..=MAX_CAMERA_ZOOM).contains(&zoom_ratio) {
            return Err(CallError::invalid_argument(format!(
                "zoom ratio {} is outside {}..={}",
                zoom_ratio, MIN_CAMERA_ZOOM, MAX_CAMERA_ZOOM
            )));
        }
        let cameras = self
            .store
            .list(|r| r.call_type == CallType::Ims && !r.state.is_ending() && r.video.camera_id.is_some())
            .await;
        if cameras.is_empty() {
            return Err(CallError::invalid_state("no video call has an open camera"));
        }
        self.radio
            .set_camera_zoom(zoom_ratio)
            .await
            .map_err(unavailable("set camera zoom"))?;
        for record in cameras {
            // The call may have ended since the snapshot
            let Ok(mut guard) = self.store.lock(record.call_id).await else {
                continue;
            };
            if guard.state.is_ending() {
                continue;
            }
            guard.video.zoom_ratio = zoom_ratio;
            self.commit_publish(std::slice::from_mut(&mut guard), Effects::default())?;
        }
        Ok(())
    }

    // ===== Audio =====

    pub fn get_audio_device(&self) -> AudioDeviceInfo {
        self.audio.info()
    }

    pub async fn set_audio_device(&self, device: &AudioDevice) -> CallResult<()> {
        self.audio.check_available(device)?;
        self.radio
            .set_audio_route(device)
            .await
            .map_err(unavailable("set audio route"))?;
        let info = self.audio.select(device)?;
        info!("Audio routed to {:?}", info.current_audio_device.device_type);
        self.publish(CallEvent::AudioDeviceChange(info));
        Ok(())
    }

    /// Mute or unmute the microphone; needs a live call
    pub async fn set_muted(&self, muted: bool) -> CallResult<()> {
        if !self.has_live_call().await {
            return Err(CallError::invalid_state("mute needs a call in progress"));
        }
        self.radio.set_mute(muted).await.map_err(unavailable("set mute"))?;
        if let Some(info) = self.audio.set_muted(muted) {
            self.publish(CallEvent::AudioDeviceChange(info));
        }
        Ok(())
    }

    /// Silence the ringtone of a ringing call
    pub async fn mute_ringer(&self) -> CallResult<()> {
        let ringing = !self.store.list(|r| r.state.is_ringing()).await.is_empty();
        if !ringing {
            return Err(CallError::invalid_state("no call is ringing"));
        }
        if self.audio.mute_ringer() {
            info!("Ringer muted");
        }
        Ok(())
    }

    // ===== Status =====

    /// Aggregate state of the device: ringing wins over off-hook
    pub async fn get_call_state(&self) -> TelCallState {
        let records = self.store.list(|r| !r.state.is_terminal()).await;
        if records.iter().any(|r| r.state.is_ringing()) {
            TelCallState::Ringing
        } else if records.is_empty() {
            TelCallState::Idle
        } else {
            TelCallState::Offhook
        }
    }

    pub async fn has_call(&self) -> bool {
        !self.store.list(|r| !r.state.is_terminal()).await.is_empty()
    }

    pub async fn is_ringing(&self) -> bool {
        !self.store.list(|r| r.state.is_ringing()).await.is_empty()
    }

    pub async fn is_in_emergency_call(&self) -> bool {
        !self
            .store
            .list(|r| r.is_emergency && !r.state.is_ending())
            .await
            .is_empty()
    }

    /// Whether a non-emergency dial would pass the dial policy right now
    pub async fn is_new_call_allowed(&self) -> bool {
        let live = self.store.list(|r| !r.state.is_ending()).await;
        live.len() < self.config.max_calls
            && !live.iter().any(|r| r.state.is_outgoing_setup() || r.state.is_ringing())
    }

    async fn has_live_call(&self) -> bool {
        !self.store.list(|r| !r.state.is_ending()).await.is_empty()
    }
}

fn unavailable(op: &'static str) -> impl Fn(CallError) -> CallError {
    move |e| match e {
        CallError::Unsupported { .. } => e,
        other => CallError::service_unavailable(format!("{} failed: {}", op, other)),
    }
}
