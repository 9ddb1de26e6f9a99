use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::errors::{CallError, CallResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioDeviceType {
    Earpiece,
    Speaker,
    WiredHeadset,
    BluetoothSco,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub device_type: AudioDeviceType,
    /// Bluetooth address; empty for built-in devices
    pub address: String,
    pub name: String,
}

impl AudioDevice {
    pub fn builtin(device_type: AudioDeviceType) -> Self {
        Self {
            device_type,
            address: String::new(),
            name: String::new(),
        }
    }

    pub fn bluetooth(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            device_type: AudioDeviceType::BluetoothSco,
            address: address.into(),
            name: name.into(),
        }
    }

    fn same_endpoint(&self, other: &AudioDevice) -> bool {
        self.device_type == other.device_type
            && (self.device_type != AudioDeviceType::BluetoothSco || self.address == other.address)
    }
}

/// Payload of the `audioDeviceChange` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDeviceInfo {
    pub audio_device_list: Vec<AudioDevice>,
    pub current_audio_device: AudioDevice,
    pub is_muted: bool,
}

/// Tracks available audio endpoints, the selected route and mute state
pub struct AudioRouter {
    state: Mutex<AudioDeviceInfo>,
    ringer_muted: Mutex<bool>,
}

impl AudioRouter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Self::default_info()),
            ringer_muted: Mutex::new(false),
        }
    }

    fn default_info() -> AudioDeviceInfo {
        AudioDeviceInfo {
            audio_device_list: vec![
                AudioDevice::builtin(AudioDeviceType::Earpiece),
                AudioDevice::builtin(AudioDeviceType::Speaker),
            ],
            current_audio_device: AudioDevice::builtin(AudioDeviceType::Earpiece),
            is_muted: false,
        }
    }

    pub fn info(&self) -> AudioDeviceInfo {
        self.state.lock().clone()
    }

    /// Fail with `InvalidArgument` unless the device is currently available
    pub fn check_available(&self, device: &AudioDevice) -> CallResult<()> {
        let state = self.state.lock();
        if state.audio_device_list.iter().any(|d| d.same_endpoint(device)) {
            Ok(())
        } else {
            Err(CallError::invalid_argument(format!(
                "audio device {:?} is not available",
                device.device_type
            )))
        }
    }

    /// Route audio to an available device
    pub fn select(&self, device: &AudioDevice) -> CallResult<AudioDeviceInfo> {
        let mut state = self.state.lock();
        let Some(found) = state.audio_device_list.iter().find(|d| d.same_endpoint(device)).cloned() else {
            return Err(CallError::invalid_argument(format!(
                "audio device {:?} is not available",
                device.device_type
            )));
        };
        state.current_audio_device = found;
        Ok(state.clone())
    }

    /// A headset or bluetooth device appeared; it takes over the route
    pub fn device_connected(&self, device: AudioDevice) -> AudioDeviceInfo {
        let mut state = self.state.lock();
        if !state.audio_device_list.iter().any(|d| d.same_endpoint(&device)) {
            state.audio_device_list.push(device.clone());
        }
        state.current_audio_device = device;
        state.clone()
    }

    /// A device went away; the route falls back to the earpiece if it was current
    pub fn device_disconnected(&self, device: &AudioDevice) -> AudioDeviceInfo {
        let mut state = self.state.lock();
        if matches!(device.device_type, AudioDeviceType::Earpiece | AudioDeviceType::Speaker) {
            return state.clone();
        }
        state.audio_device_list.retain(|d| !d.same_endpoint(device));
        if state.current_audio_device.same_endpoint(device) {
            state.current_audio_device = AudioDevice::builtin(AudioDeviceType::Earpiece);
        }
        state.clone()
    }

    /// Returns the new info if the mute state changed
    pub fn set_muted(&self, muted: bool) -> Option<AudioDeviceInfo> {
        let mut state = self.state.lock();
        if state.is_muted == muted {
            return None;
        }
        state.is_muted = muted;
        Some(state.clone())
    }

    pub fn mute_ringer(&self) -> bool {
        let mut muted = self.ringer_muted.lock();
        let changed = !*muted;
        *muted = true;
        changed
    }

    pub fn is_ringer_muted(&self) -> bool {
        *self.ringer_muted.lock()
    }

    /// Called once the last call ended
    pub fn reset_for_idle(&self) -> Option<AudioDeviceInfo> {
        *self.ringer_muted.lock() = false;
        self.set_muted(false)
    }
}

impl Default for AudioRouter {
    fn default() -> Self {
        Self::new()
    }
}
