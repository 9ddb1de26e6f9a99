//! In-process radio used by tests and the simulator CLI.
//!
//! Every request is recorded. Requests that would produce a network response
//! (hang-up, MMI, IMS mode changes, camera control) push the matching
//! [`RadioSignal`] onto the signal channel returned by [`LoopbackRadio::new`].

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::radio::{DialRequest, RadioLink, RadioSignal, SignalEvent, SurfaceTarget};
use crate::errors::{CallError, CallResult};
use crate::events::{CallSessionEventId, VideoRequestResult};
use crate::services::audio::AudioDevice;
use crate::services::supplementary::{
    CallRestrictionInfo, CallRestrictionMode, CallRestrictionType, CallTransferInfo, CallTransferResult,
    CallTransferSettingType, CallTransferType, CallWaitingStatus, RestrictionStatus, TransferStatus, VoNrState,
};
use crate::types::{CallId, DisconnectedReason, ImsCallMode, IncomingCallInfo, SlotId, VideoState};
use crate::utils::mmi::{MmiCode, MmiCodeInfo};

const DEFAULT_RESTRICTION_PASSWORD: &str = "0000";
const LOOPBACK_CAMERA_WIDTH: u32 = 640;
const LOOPBACK_CAMERA_HEIGHT: u32 = 480;

/// One request as the radio received it
#[derive(Debug, Clone, PartialEq)]
pub struct RadioCommand {
    pub op: &'static str,
    pub call_id: Option<CallId>,
    pub detail: String,
}

#[derive(Debug, Clone)]
struct SlotSettings {
    call_waiting: CallWaitingStatus,
    restrictions: HashMap<CallRestrictionType, RestrictionStatus>,
    restriction_password: String,
    transfers: HashMap<CallTransferType, CallTransferResult>,
    ims_enabled: bool,
    vonr: VoNrState,
}

impl Default for SlotSettings {
    fn default() -> Self {
        Self {
            call_waiting: CallWaitingStatus::Enabled,
            restrictions: HashMap::new(),
            restriction_password: DEFAULT_RESTRICTION_PASSWORD.to_string(),
            transfers: HashMap::new(),
            ims_enabled: true,
            vonr: VoNrState::Off,
        }
    }
}

/// Radio that answers locally instead of talking to a modem
pub struct LoopbackRadio {
    signals: mpsc::UnboundedSender<RadioSignal>,
    online: AtomicBool,
    auto_release: AtomicBool,
    auto_connect: AtomicBool,
    latency: Mutex<Option<Duration>>,
    failing: Mutex<HashSet<&'static str>>,
    commands: Mutex<Vec<RadioCommand>>,
    slots: DashMap<SlotId, SlotSettings>,
}

impl LoopbackRadio {
    /// Create a radio and the channel its signals arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RadioSignal>) {
        let (signals, rx) = mpsc::unbounded_channel();
        let radio = Self {
            signals,
            online: AtomicBool::new(true),
            auto_release: AtomicBool::new(true),
            auto_connect: AtomicBool::new(false),
            latency: Mutex::new(None),
            failing: Mutex::new(HashSet::new()),
            commands: Mutex::new(Vec::new()),
            slots: DashMap::new(),
        };
        (radio, rx)
    }

    /// Release calls right after a hang-up or kick-out request (default on)
    pub fn with_auto_release(self, enabled: bool) -> Self {
        self.auto_release.store(enabled, Ordering::Relaxed);
        self
    }

    /// Report network acceptance and remote answer right after a dial
    pub fn with_auto_connect(self, enabled: bool) -> Self {
        self.auto_connect.store(enabled, Ordering::Relaxed);
        self
    }

    /// Delay every request by `latency`
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = Some(latency);
        self
    }

    /// Offline radios refuse every request with `ServiceUnavailable`
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    /// Make every future `op` request fail
    pub fn fail_on(&self, op: &'static str) {
        self.failing.lock().insert(op);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn commands(&self) -> Vec<RadioCommand> {
        self.commands.lock().clone()
    }

    /// Names of the requests received so far, in order
    pub fn ops(&self) -> Vec<&'static str> {
        self.commands.lock().iter().map(|c| c.op).collect()
    }

    // Network-side stimuli

    /// Push an arbitrary signal
    pub fn inject(&self, signal: RadioSignal) {
        if self.signals.send(signal).is_err() {
            debug!("Loopback signal dropped: nobody is listening");
        }
    }

    pub fn network_accepted(&self, call_id: CallId) {
        self.inject(RadioSignal::call(call_id, SignalEvent::NetworkAccepted));
    }

    pub fn remote_answered(&self, call_id: CallId) {
        self.inject(RadioSignal::call(call_id, SignalEvent::RemoteAnswered));
    }

    pub fn release(&self, call_id: CallId, reason: DisconnectedReason) {
        self.inject(RadioSignal::call(call_id, SignalEvent::Released(reason)));
    }

    pub fn abort(&self, call_id: CallId, reason: DisconnectedReason) {
        self.inject(RadioSignal::call(call_id, SignalEvent::Abort(reason)));
    }

    pub fn ring(&self, info: IncomingCallInfo) {
        self.inject(RadioSignal::Incoming(info));
    }

    async fn request(&self, op: &'static str, call_id: Option<CallId>, detail: String) -> CallResult<()> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if !self.online.load(Ordering::Relaxed) {
            return Err(CallError::service_unavailable(format!("radio is offline ({})", op)));
        }
        if self.failing.lock().contains(op) {
            return Err(CallError::service_unavailable(format!("radio rejected {}", op)));
        }
        trace!("Loopback {} {:?} {}", op, call_id, detail);
        self.commands.lock().push(RadioCommand { op, call_id, detail });
        Ok(())
    }

    fn released_after_request(&self, call_id: CallId) {
        if self.auto_release.load(Ordering::Relaxed) {
            self.release(call_id, DisconnectedReason::NormalCallClearing);
        }
    }

    fn slot(&self, slot: SlotId) -> dashmap::mapref::one::RefMut<'_, SlotId, SlotSettings> {
        self.slots.entry(slot).or_default()
    }
}

#[async_trait]
impl RadioLink for LoopbackRadio {
    async fn dial(&self, request: &DialRequest) -> CallResult<()> {
        self.request("dial", Some(request.call_id), request.number.clone()).await?;
        if self.auto_connect.load(Ordering::Relaxed) {
            self.network_accepted(request.call_id);
            self.remote_answered(request.call_id);
        }
        Ok(())
    }

    async fn answer(&self, call_id: CallId, video_state: VideoState) -> CallResult<()> {
        self.request("answer", Some(call_id), format!("{:?}", video_state)).await
    }

    async fn reject(&self, call_id: CallId, message: Option<&str>) -> CallResult<()> {
        self.request("reject", Some(call_id), message.unwrap_or_default().to_string())
            .await
    }

    async fn hang_up(&self, call_id: CallId) -> CallResult<()> {
        self.request("hang_up", Some(call_id), String::new()).await?;
        self.released_after_request(call_id);
        Ok(())
    }

    async fn hold(&self, call_id: CallId) -> CallResult<()> {
        self.request("hold", Some(call_id), String::new()).await
    }

    async fn unhold(&self, call_id: CallId) -> CallResult<()> {
        self.request("unhold", Some(call_id), String::new()).await
    }

    async fn switch(&self, active: CallId, held: CallId) -> CallResult<()> {
        self.request("switch", Some(held), format!("active={}", active)).await
    }

    async fn combine(&self, main: CallId, members: &[CallId]) -> CallResult<()> {
        let members: Vec<String> = members.iter().map(|id| id.to_string()).collect();
        self.request("combine", Some(main), members.join(",")).await
    }

    async fn separate(&self, call_id: CallId) -> CallResult<()> {
        self.request("separate", Some(call_id), String::new()).await
    }

    async fn kick_out(&self, call_id: CallId) -> CallResult<()> {
        self.request("kick_out", Some(call_id), String::new()).await?;
        self.released_after_request(call_id);
        Ok(())
    }

    async fn start_dtmf(&self, call_id: CallId, tone: char) -> CallResult<()> {
        self.request("start_dtmf", Some(call_id), tone.to_string()).await
    }

    async fn stop_dtmf(&self, call_id: CallId) -> CallResult<()> {
        self.request("stop_dtmf", Some(call_id), String::new()).await
    }

    async fn send_post_dial(&self, call_id: CallId, digits: &str) -> CallResult<()> {
        self.request("send_post_dial", Some(call_id), digits.to_string()).await
    }

    async fn send_mmi(&self, slot: SlotId, code: &MmiCode) -> CallResult<()> {
        self.request("send_mmi", None, format!("slot={} {}", slot, code.full_string))
            .await?;
        self.inject(RadioSignal::MmiResult(MmiCodeInfo::success(format!(
            "{} accepted",
            code.full_string
        ))));
        Ok(())
    }

    async fn set_audio_route(&self, device: &AudioDevice) -> CallResult<()> {
        self.request("set_audio_route", None, format!("{:?}", device.device_type))
            .await
    }

    async fn set_mute(&self, muted: bool) -> CallResult<()> {
        self.request("set_mute", None, muted.to_string()).await
    }

    async fn get_call_waiting(&self, slot: SlotId) -> CallResult<CallWaitingStatus> {
        self.request("get_call_waiting", None, format!("slot={}", slot)).await?;
        Ok(self.slot(slot).call_waiting)
    }

    async fn set_call_waiting(&self, slot: SlotId, enabled: bool) -> CallResult<()> {
        self.request("set_call_waiting", None, format!("slot={} {}", slot, enabled))
            .await?;
        self.slot(slot).call_waiting = if enabled {
            CallWaitingStatus::Enabled
        } else {
            CallWaitingStatus::Disabled
        };
        Ok(())
    }

    async fn get_call_restriction(&self, slot: SlotId, kind: CallRestrictionType) -> CallResult<RestrictionStatus> {
        self.request("get_call_restriction", None, format!("slot={} {:?}", slot, kind))
            .await?;
        Ok(self
            .slot(slot)
            .restrictions
            .get(&kind)
            .copied()
            .unwrap_or(RestrictionStatus::NotRegistered))
    }

    async fn set_call_restriction(&self, slot: SlotId, info: &CallRestrictionInfo) -> CallResult<()> {
        self.request(
            "set_call_restriction",
            None,
            format!("slot={} {:?} {:?}", slot, info.restriction_type, info.mode),
        )
        .await?;
        let mut settings = self.slot(slot);
        if settings.restriction_password != info.password {
            return Err(CallError::invalid_argument("call restriction password mismatch"));
        }
        let status = match info.mode {
            CallRestrictionMode::Activation => RestrictionStatus::Activated,
            CallRestrictionMode::Deactivation => RestrictionStatus::NotRegistered,
        };
        settings.restrictions.insert(info.restriction_type, status);
        Ok(())
    }

    async fn set_restriction_password(
        &self,
        slot: SlotId,
        kind: CallRestrictionType,
        old_password: &str,
        new_password: &str,
    ) -> CallResult<()> {
        self.request("set_restriction_password", None, format!("slot={} {:?}", slot, kind))
            .await?;
        let mut settings = self.slot(slot);
        if settings.restriction_password != old_password {
            return Err(CallError::invalid_argument("call restriction password mismatch"));
        }
        settings.restriction_password = new_password.to_string();
        Ok(())
    }

    async fn get_call_transfer(&self, slot: SlotId, kind: CallTransferType) -> CallResult<CallTransferResult> {
        self.request("get_call_transfer", None, format!("slot={} {:?}", slot, kind))
            .await?;
        Ok(self
            .slot(slot)
            .transfers
            .get(&kind)
            .cloned()
            .unwrap_or(CallTransferResult {
                status: TransferStatus::Disabled,
                number: String::new(),
            }))
    }

    async fn set_call_transfer(&self, slot: SlotId, info: &CallTransferInfo) -> CallResult<()> {
        self.request(
            "set_call_transfer",
            None,
            format!("slot={} {:?} {:?}", slot, info.transfer_type, info.setting_type),
        )
        .await?;
        let mut settings = self.slot(slot);
        match info.setting_type {
            CallTransferSettingType::Enable | CallTransferSettingType::Registration => {
                let number = if info.transfer_num.is_empty() {
                    settings
                        .transfers
                        .get(&info.transfer_type)
                        .map(|t| t.number.clone())
                        .unwrap_or_default()
                } else {
                    info.transfer_num.clone()
                };
                settings.transfers.insert(
                    info.transfer_type,
                    CallTransferResult {
                        status: TransferStatus::Enabled,
                        number,
                    },
                );
            }
            CallTransferSettingType::Disable => {
                if let Some(transfer) = settings.transfers.get_mut(&info.transfer_type) {
                    transfer.status = TransferStatus::Disabled;
                }
            }
            CallTransferSettingType::Erasure => {
                settings.transfers.remove(&info.transfer_type);
            }
        }
        Ok(())
    }

    async fn update_ims_call_mode(&self, call_id: CallId, mode: ImsCallMode) -> CallResult<()> {
        self.request("update_ims_call_mode", Some(call_id), format!("{:?}", mode))
            .await?;
        self.inject(RadioSignal::call(
            call_id,
            SignalEvent::ImsCallModeResponse {
                mode,
                result: VideoRequestResult::Success,
            },
        ));
        Ok(())
    }

    async fn cancel_call_upgrade(&self, call_id: CallId) -> CallResult<()> {
        self.request("cancel_call_upgrade", Some(call_id), String::new()).await
    }

    async fn control_camera(&self, call_id: CallId, camera_id: &str) -> CallResult<()> {
        self.request("control_camera", Some(call_id), camera_id.to_string()).await?;
        if camera_id.is_empty() {
            return Ok(());
        }
        self.inject(RadioSignal::call(
            call_id,
            SignalEvent::Session(CallSessionEventId::CameraReady),
        ));
        self.inject(RadioSignal::call(
            call_id,
            SignalEvent::CameraCapabilities {
                width: LOOPBACK_CAMERA_WIDTH,
                height: LOOPBACK_CAMERA_HEIGHT,
            },
        ));
        Ok(())
    }

    async fn set_surface(&self, call_id: CallId, target: SurfaceTarget, surface_id: &str) -> CallResult<()> {
        self.request("set_surface", Some(call_id), format!("{:?} {}", target, surface_id))
            .await
    }

    async fn set_device_direction(&self, call_id: CallId, rotation: u16) -> CallResult<()> {
        self.request("set_device_direction", Some(call_id), rotation.to_string())
            .await
    }

    async fn set_camera_zoom(&self, zoom_ratio: f32) -> CallResult<()> {
        self.request("set_camera_zoom", None, zoom_ratio.to_string()).await
    }

    async fn set_ims_switch(&self, slot: SlotId, enabled: bool) -> CallResult<()> {
        self.request("set_ims_switch", None, format!("slot={} {}", slot, enabled))
            .await?;
        self.slot(slot).ims_enabled = enabled;
        Ok(())
    }

    async fn get_ims_switch(&self, slot: SlotId) -> CallResult<bool> {
        self.request("get_ims_switch", None, format!("slot={}", slot)).await?;
        Ok(self.slot(slot).ims_enabled)
    }

    async fn set_vonr_state(&self, slot: SlotId, state: VoNrState) -> CallResult<()> {
        self.request("set_vonr_state", None, format!("slot={} {:?}", slot, state))
            .await?;
        self.slot(slot).vonr = state;
        Ok(())
    }

    async fn get_vonr_state(&self, slot: SlotId) -> CallResult<VoNrState> {
        self.request("get_vonr_state", None, format!("slot={}", slot)).await?;
        Ok(self.slot(slot).vonr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::supplementary::CallRestrictionMode;

    #[tokio::test]
    async fn test_hang_up_reports_release() {
        let (radio, mut rx) = LoopbackRadio::new();
        radio.hang_up(CallId(3)).await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(RadioSignal::call(
                CallId(3),
                SignalEvent::Released(DisconnectedReason::NormalCallClearing)
            ))
        );
        assert_eq!(radio.ops(), vec!["hang_up"]);
    }

    #[tokio::test]
    async fn test_offline_radio_refuses_requests() {
        let (radio, _rx) = LoopbackRadio::new();
        radio.set_online(false);
        let err = radio.hold(CallId(1)).await.unwrap_err();
        assert_eq!(err.category(), "service_unavailable");
        assert!(radio.commands().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_only_hits_named_op() {
        let (radio, _rx) = LoopbackRadio::new();
        radio.fail_on("hold");
        assert!(radio.hold(CallId(1)).await.is_err());
        assert!(radio.unhold(CallId(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_restriction_requires_matching_password() {
        let (radio, _rx) = LoopbackRadio::new();
        let mut info = CallRestrictionInfo {
            restriction_type: CallRestrictionType::AllOutgoing,
            password: "1234".to_string(),
            mode: CallRestrictionMode::Activation,
        };
        assert!(radio.set_call_restriction(0, &info).await.is_err());

        info.password = DEFAULT_RESTRICTION_PASSWORD.to_string();
        radio.set_call_restriction(0, &info).await.unwrap();
        assert_eq!(
            radio
                .get_call_restriction(0, CallRestrictionType::AllOutgoing)
                .await
                .unwrap(),
            RestrictionStatus::Activated
        );
        // Other slots are independent
        assert_eq!(
            radio
                .get_call_restriction(1, CallRestrictionType::AllOutgoing)
                .await
                .unwrap(),
            RestrictionStatus::NotRegistered
        );
    }
}
