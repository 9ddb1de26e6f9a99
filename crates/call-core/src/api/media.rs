use super::gateway::CallGateway;
use super::permissions::Permission;
use crate::errors::{CallError, CallResult};
use crate::services::audio::{AudioDevice, AudioDeviceInfo};
use crate::types::{CallId, ImsCallMode, TelCallState};
use crate::utils::number::{DialString, is_dtmf_char};

impl CallGateway {
    // ===== DTMF =====

    pub async fn start_dtmf(&self, call_id: CallId, tone: char) -> CallResult<()> {
        if !is_dtmf_char(tone) {
            return Err(CallError::invalid_argument(format!("'{}' is not a DTMF tone", tone)));
        }
        self.require_call(call_id).await?;
        self.engine
            .start_dtmf(call_id, tone)
            .await
            .map_err(CallError::into_api_error)
    }

    pub async fn stop_dtmf(&self, call_id: CallId) -> CallResult<()> {
        self.require_call(call_id).await?;
        self.engine.stop_dtmf(call_id).await.map_err(CallError::into_api_error)
    }

    /// Continue (or drop) post-dial digits paused at a wait
    pub async fn post_dial_proceed(&self, call_id: CallId, proceed: bool) -> CallResult<()> {
        self.require_call(call_id).await?;
        self.engine
            .post_dial_proceed(call_id, proceed)
            .await
            .map_err(CallError::into_api_error)
    }

    // ===== Audio =====

    pub async fn set_audio_device(&self, device: &AudioDevice) -> CallResult<()> {
        self.require(Permission::SetTelephonyState)?;
        self.engine.set_audio_device(device).await
    }

    pub fn get_audio_device(&self) -> AudioDeviceInfo {
        self.engine.get_audio_device()
    }

    pub async fn set_muted(&self) -> CallResult<()> {
        self.require(Permission::SetTelephonyState)?;
        self.engine.set_muted(true).await
    }

    pub async fn cancel_muted(&self) -> CallResult<()> {
        self.require(Permission::SetTelephonyState)?;
        self.engine.set_muted(false).await
    }

    pub async fn mute_ringer(&self) -> CallResult<()> {
        self.require(Permission::SetTelephonyState)?;
        self.engine.mute_ringer().await
    }

    // ===== Video =====

    pub async fn update_ims_call_mode(&self, call_id: CallId, mode: ImsCallMode) -> CallResult<()> {
        self.require_call(call_id).await?;
        self.engine
            .update_ims_call_mode(call_id, mode)
            .await
            .map_err(CallError::into_api_error)
    }

    pub async fn control_camera(&self, call_id: CallId, camera_id: &str) -> CallResult<()> {
        self.require_call(call_id).await?;
        self.engine
            .control_camera(call_id, camera_id)
            .await
            .map_err(CallError::into_api_error)
    }

    pub async fn set_preview_surface(&self, call_id: CallId, surface_id: &str) -> CallResult<()> {
        self.require_call(call_id).await?;
        self.engine
            .set_preview_surface(call_id, surface_id)
            .await
            .map_err(CallError::into_api_error)
    }

    pub async fn set_display_surface(&self, call_id: CallId, surface_id: &str) -> CallResult<()> {
        self.require_call(call_id).await?;
        self.engine
            .set_display_surface(call_id, surface_id)
            .await
            .map_err(CallError::into_api_error)
    }

    pub async fn set_device_direction(&self, call_id: CallId, rotation: u16) -> CallResult<()> {
        self.require_call(call_id).await?;
        self.engine
            .set_device_direction(call_id, rotation)
            .await
            .map_err(CallError::into_api_error)
    }

    pub async fn set_camera_zoom(&self, zoom_ratio: f32) -> CallResult<()> {
        self.engine.set_camera_zoom(zoom_ratio).await
    }

    pub async fn cancel_call_upgrade(&self, call_id: CallId) -> CallResult<()> {
        self.require_call(call_id).await?;
        self.engine
            .cancel_call_upgrade(call_id)
            .await
            .map_err(CallError::into_api_error)
    }

    // ===== Status =====

    pub async fn get_call_state(&self) -> TelCallState {
        self.engine.get_call_state().await
    }

    pub async fn has_call(&self) -> bool {
        self.engine.has_call().await
    }

    pub async fn is_ringing(&self) -> CallResult<bool> {
        self.require(Permission::SetTelephonyState)?;
        Ok(self.engine.is_ringing().await)
    }

    pub async fn is_in_emergency_call(&self) -> CallResult<bool> {
        self.require(Permission::SetTelephonyState)?;
        Ok(self.engine.is_in_emergency_call().await)
    }

    pub async fn is_new_call_allowed(&self) -> bool {
        self.engine.is_new_call_allowed().await
    }

    /// Whether `number` is an emergency number. Formatting characters are
    /// ignored.
    pub fn is_emergency_phone_number(&self, number: &str, slot: u32) -> CallResult<bool> {
        self.require_slot(slot)?;
        let parsed = DialString::parse(number, self.config().max_number_len)?;
        Ok(parsed.post_dial.is_none() && self.config().is_emergency_number(&parsed.number))
    }
}
