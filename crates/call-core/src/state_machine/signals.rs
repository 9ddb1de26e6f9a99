use tracing::{debug, info};

use super::{CallEngine, Effects};
use crate::adapters::radio::{RadioSignal, SignalEvent};
use crate::errors::CallResult;
use crate::events::{CallEvent, CallSessionEventId, ImsCallModeInfo, VideoRequestResult};
use crate::state_table::EventType;
use crate::types::{CallId, DisconnectedDetails};

impl CallEngine {
    /// Apply one asynchronous report from the radio
    pub async fn handle_signal(&self, signal: RadioSignal) -> CallResult<()> {
        match signal {
            RadioSignal::Call { call_id, event } => self.handle_call_signal(call_id, event).await,
            RadioSignal::Incoming(info) => self.handle_incoming(info).await.map(|_| ()),
            RadioSignal::MmiResult(info) => {
                debug!("MMI result: {:?}", info.result);
                self.publish(CallEvent::MmiCodeResult(info));
                Ok(())
            }
            RadioSignal::AudioDeviceConnected(device) => {
                info!("Audio device connected: {:?}", device.device_type);
                let info = self.audio.device_connected(device);
                self.publish(CallEvent::AudioDeviceChange(info));
                Ok(())
            }
            RadioSignal::AudioDeviceDisconnected(device) => {
                info!("Audio device disconnected: {:?}", device.device_type);
                let info = self.audio.device_disconnected(&device);
                self.publish(CallEvent::AudioDeviceChange(info));
                Ok(())
            }
        }
    }

    /// Apply a radio report about one call
    pub async fn handle_call_signal(&self, call_id: CallId, event: SignalEvent) -> CallResult<()> {
        match event {
            SignalEvent::NetworkAccepted => self.network_accepted(call_id).await,
            SignalEvent::RemoteAnswered => self.remote_answered(call_id).await,
            SignalEvent::Released(reason) => {
                self.disconnect(call_id, EventType::Released, DisconnectedDetails::new(reason))
                    .await
            }
            SignalEvent::Abort(reason) => {
                self.disconnect(call_id, EventType::Abort, DisconnectedDetails::new(reason))
                    .await
            }
            SignalEvent::ImsCallModeResponse { mode, result } => {
                if result == VideoRequestResult::Success {
                    let mut guard = self.store.lock(call_id).await?;
                    if !guard.state.is_ending() {
                        guard.ims_call_mode = mode;
                        guard.video_state = mode.video_state();
                        self.commit_publish(std::slice::from_mut(&mut guard), Effects::default())?;
                    }
                }
                self.publish(CallEvent::ImsCallModeChange(ImsCallModeInfo {
                    call_id,
                    mode,
                    result,
                }));
                Ok(())
            }
            SignalEvent::Session(event_id) => {
                let released = match event_id {
                    CallSessionEventId::ReleaseDisplaySurface => Some(true),
                    CallSessionEventId::ReleasePreviewSurface => Some(false),
                    _ => None,
                };
                if let Some(display) = released {
                    let mut guard = self.store.lock(call_id).await?;
                    if !guard.state.is_terminal() {
                        if display {
                            guard.video.display_surface = None;
                        } else {
                            guard.video.preview_surface = None;
                        }
                        self.commit_publish(std::slice::from_mut(&mut guard), Effects::default())?;
                    }
                }
                self.publish(CallEvent::CallSessionEvent { call_id, event_id });
                Ok(())
            }
            SignalEvent::PeerDimensions { width, height } => {
                self.store.get(call_id).await?;
                self.publish(CallEvent::PeerDimensionsChange {
                    call_id,
                    width,
                    height,
                });
                Ok(())
            }
            SignalEvent::CameraCapabilities { width, height } => {
                self.store.get(call_id).await?;
                self.publish(CallEvent::CameraCapabilitiesChange {
                    call_id,
                    width,
                    height,
                });
                Ok(())
            }
        }
    }
}
