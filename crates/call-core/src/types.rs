//! Core call data model
//!
//! [`CallRecord`] is the authoritative state of one call. Records are owned by
//! the [`CallStore`](crate::call_store::CallStore) and mutated only by the
//! [`CallEngine`](crate::state_machine::CallEngine).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Call identifier, allocated from a monotonic counter starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub u32);

impl CallId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CallId {
    fn from(value: u32) -> Self {
        CallId(value)
    }
}

/// SIM slot index
pub type SlotId = u32;

/// Detailed state of a single call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallState {
    Idle,
    Dialing,
    Alerting,
    Incoming,
    Waiting,
    Active,
    Holding,
    Disconnecting,
    Disconnected,
}

impl CallState {
    pub const ALL: [CallState; 9] = [
        CallState::Idle,
        CallState::Dialing,
        CallState::Alerting,
        CallState::Incoming,
        CallState::Waiting,
        CallState::Active,
        CallState::Holding,
        CallState::Disconnecting,
        CallState::Disconnected,
    ];

    /// Disconnecting or disconnected
    pub fn is_ending(&self) -> bool {
        matches!(self, CallState::Disconnecting | CallState::Disconnected)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Disconnected)
    }

    pub fn is_ringing(&self) -> bool {
        matches!(self, CallState::Incoming | CallState::Waiting)
    }

    /// States that occupy the foreground (the audio path the user hears)
    pub fn is_foreground(&self) -> bool {
        matches!(self, CallState::Dialing | CallState::Alerting | CallState::Active)
    }

    pub fn is_outgoing_setup(&self) -> bool {
        matches!(self, CallState::Dialing | CallState::Alerting)
    }

    pub fn is_established(&self) -> bool {
        matches!(self, CallState::Active | CallState::Holding)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Idle => "IDLE",
            CallState::Dialing => "DIALING",
            CallState::Alerting => "ALERTING",
            CallState::Incoming => "INCOMING",
            CallState::Waiting => "WAITING",
            CallState::Active => "ACTIVE",
            CallState::Holding => "HOLDING",
            CallState::Disconnecting => "DISCONNECTING",
            CallState::Disconnected => "DISCONNECTED",
        };
        f.write_str(name)
    }
}

/// Aggregate device call state reported by `get_call_state`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TelCallState {
    Unknown,
    Idle,
    Ringing,
    Offhook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallType {
    Cs,
    Ims,
    Ott,
    Voip,
}

impl CallType {
    /// Calls carried by the cellular radio
    pub fn is_cellular(&self) -> bool {
        matches!(self, CallType::Cs | CallType::Ims)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoState {
    Voice,
    VideoSend,
    VideoReceive,
    VideoBidirectional,
}

impl VideoState {
    pub fn is_video(&self) -> bool {
        !matches!(self, VideoState::Voice)
    }
}

impl Default for VideoState {
    fn default() -> Self {
        VideoState::Voice
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallDirection {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConferenceState {
    Idle,
    Active,
    Disconnecting,
    Disconnected,
}

impl Default for ConferenceState {
    fn default() -> Self {
        ConferenceState::Idle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialScene {
    Normal,
    Privileged,
    Emergency,
}

impl Default for DialScene {
    fn default() -> Self {
        DialScene::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialType {
    Carrier,
    VoiceMail,
    Ott,
}

impl Default for DialType {
    fn default() -> Self {
        DialType::Carrier
    }
}

/// IMS media negotiation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImsCallMode {
    AudioOnly,
    SendOnly,
    ReceiveOnly,
    SendReceive,
    VideoPaused,
}

impl ImsCallMode {
    /// Video state a call ends up in once the mode is negotiated
    pub fn video_state(&self) -> VideoState {
        match self {
            ImsCallMode::AudioOnly | ImsCallMode::VideoPaused => VideoState::Voice,
            ImsCallMode::SendOnly => VideoState::VideoSend,
            ImsCallMode::ReceiveOnly => VideoState::VideoReceive,
            ImsCallMode::SendReceive => VideoState::VideoBidirectional,
        }
    }
}

impl Default for ImsCallMode {
    fn default() -> Self {
        ImsCallMode::AudioOnly
    }
}

/// Network release cause (3GPP TS 24.008 cause values plus radio specific codes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisconnectedReason {
    UnassignedNumber,
    NoRouteToDestination,
    OperatorDeterminedBarring,
    CallCompletedElsewhere,
    NormalCallClearing,
    UserBusy,
    NoUserResponding,
    UserAlertingNoAnswer,
    CallRejected,
    NumberChanged,
    InvalidNumberFormat,
    NormalUnspecified,
    NetworkOutOfOrder,
    TemporaryFailure,
    CallBarred,
    FdnBlocked,
    RadioOff,
    OutOfService,
    NoValidSim,
    NetworkRespTimeout,
    NetworkReject,
    RadioLinkFailure,
    RadioLinkLost,
    CallNotAllow,
    Unknown,
    /// Any other cause code reported by the radio
    Other(u16),
}

impl DisconnectedReason {
    pub fn code(&self) -> u16 {
        match self {
            DisconnectedReason::UnassignedNumber => 1,
            DisconnectedReason::NoRouteToDestination => 3,
            DisconnectedReason::OperatorDeterminedBarring => 8,
            DisconnectedReason::CallCompletedElsewhere => 13,
            DisconnectedReason::NormalCallClearing => 16,
            DisconnectedReason::UserBusy => 17,
            DisconnectedReason::NoUserResponding => 18,
            DisconnectedReason::UserAlertingNoAnswer => 19,
            DisconnectedReason::CallRejected => 21,
            DisconnectedReason::NumberChanged => 22,
            DisconnectedReason::InvalidNumberFormat => 28,
            DisconnectedReason::NormalUnspecified => 31,
            DisconnectedReason::NetworkOutOfOrder => 38,
            DisconnectedReason::TemporaryFailure => 41,
            DisconnectedReason::CallBarred => 240,
            DisconnectedReason::FdnBlocked => 241,
            DisconnectedReason::RadioOff => 247,
            DisconnectedReason::OutOfService => 248,
            DisconnectedReason::NoValidSim => 249,
            DisconnectedReason::NetworkRespTimeout => 251,
            DisconnectedReason::NetworkReject => 252,
            DisconnectedReason::RadioLinkFailure => 254,
            DisconnectedReason::RadioLinkLost => 255,
            DisconnectedReason::CallNotAllow => 1029,
            DisconnectedReason::Unknown => 1279,
            DisconnectedReason::Other(code) => *code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            1 => DisconnectedReason::UnassignedNumber,
            3 => DisconnectedReason::NoRouteToDestination,
            8 => DisconnectedReason::OperatorDeterminedBarring,
            13 => DisconnectedReason::CallCompletedElsewhere,
            16 => DisconnectedReason::NormalCallClearing,
            17 => DisconnectedReason::UserBusy,
            18 => DisconnectedReason::NoUserResponding,
            19 => DisconnectedReason::UserAlertingNoAnswer,
            21 => DisconnectedReason::CallRejected,
            22 => DisconnectedReason::NumberChanged,
            28 => DisconnectedReason::InvalidNumberFormat,
            31 => DisconnectedReason::NormalUnspecified,
            38 => DisconnectedReason::NetworkOutOfOrder,
            41 => DisconnectedReason::TemporaryFailure,
            240 => DisconnectedReason::CallBarred,
            241 => DisconnectedReason::FdnBlocked,
            247 => DisconnectedReason::RadioOff,
            248 => DisconnectedReason::OutOfService,
            249 => DisconnectedReason::NoValidSim,
            251 => DisconnectedReason::NetworkRespTimeout,
            252 => DisconnectedReason::NetworkReject,
            254 => DisconnectedReason::RadioLinkFailure,
            255 => DisconnectedReason::RadioLinkLost,
            1029 => DisconnectedReason::CallNotAllow,
            1279 => DisconnectedReason::Unknown,
            other => DisconnectedReason::Other(other),
        }
    }
}

/// Why a call ended, attached to the record at DISCONNECTED
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectedDetails {
    pub reason: DisconnectedReason,
    pub message: String,
}

impl DisconnectedDetails {
    pub fn new(reason: DisconnectedReason) -> Self {
        Self {
            reason,
            message: String::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Camera and surface attributes of a video call
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoAttributes {
    pub camera_id: Option<String>,
    pub preview_surface: Option<String>,
    pub display_surface: Option<String>,
    /// Device rotation in degrees (0, 90, 180 or 270)
    pub device_direction: u16,
    pub zoom_ratio: f32,
}

/// One per active or recently-ended call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: CallId,
    pub state: CallState,
    pub call_type: CallType,
    pub video_state: VideoState,
    pub direction: CallDirection,
    pub conference_state: ConferenceState,
    /// Conference host; the host names itself
    pub main_call_id: Option<CallId>,
    pub account_number: String,
    /// SIM slot the call is placed on
    pub account_id: SlotId,
    pub start_time: DateTime<Utc>,
    pub state_changed_at: DateTime<Utc>,
    pub is_emergency: bool,
    pub dial_scene: DialScene,
    pub dial_type: DialType,
    pub disconnect_cause: Option<DisconnectedDetails>,
    /// Digits still to be sent once the call is connected
    pub post_dial: Option<String>,
    pub ims_call_mode: ImsCallMode,
    pub video: VideoAttributes,
    /// Tone currently being played, if any
    pub dtmf_active: Option<char>,
}

impl CallRecord {
    pub fn in_conference(&self) -> bool {
        matches!(self.conference_state, ConferenceState::Active | ConferenceState::Disconnecting)
    }

    pub fn is_conference_main(&self) -> bool {
        self.in_conference() && self.main_call_id == Some(self.call_id)
    }

    /// Id of the unit this call belongs to: the conference main for members,
    /// the call itself otherwise.
    pub fn unit_id(&self) -> CallId {
        if self.in_conference() {
            self.main_call_id.unwrap_or(self.call_id)
        } else {
            self.call_id
        }
    }
}

/// Initial contents of a record handed to [`CallStore::create`](crate::call_store::CallStore::create)
#[derive(Debug, Clone, PartialEq)]
pub struct NewCall {
    pub state: CallState,
    pub call_type: CallType,
    pub video_state: VideoState,
    pub direction: CallDirection,
    pub account_number: String,
    pub account_id: SlotId,
    pub is_emergency: bool,
    pub dial_scene: DialScene,
    pub dial_type: DialType,
    pub post_dial: Option<String>,
}

impl NewCall {
    pub fn outgoing(number: impl Into<String>, account_id: SlotId) -> Self {
        Self {
            state: CallState::Idle,
            call_type: CallType::Cs,
            video_state: VideoState::Voice,
            direction: CallDirection::Outgoing,
            account_number: number.into(),
            account_id,
            is_emergency: false,
            dial_scene: DialScene::Normal,
            dial_type: DialType::Carrier,
            post_dial: None,
        }
    }

    pub fn incoming(number: impl Into<String>, account_id: SlotId) -> Self {
        Self {
            direction: CallDirection::Incoming,
            ..Self::outgoing(number, account_id)
        }
    }

    pub fn with_state(mut self, state: CallState) -> Self {
        self.state = state;
        self
    }

    pub fn with_call_type(mut self, call_type: CallType) -> Self {
        self.call_type = call_type;
        self
    }

    pub fn with_video_state(mut self, video_state: VideoState) -> Self {
        self.video_state = video_state;
        self
    }

    pub(crate) fn into_record(self, call_id: CallId) -> CallRecord {
        let now = Utc::now();
        let ims_call_mode = match self.video_state {
            VideoState::Voice => ImsCallMode::AudioOnly,
            VideoState::VideoSend => ImsCallMode::SendOnly,
            VideoState::VideoReceive => ImsCallMode::ReceiveOnly,
            VideoState::VideoBidirectional => ImsCallMode::SendReceive,
        };
        CallRecord {
            call_id,
            state: self.state,
            call_type: self.call_type,
            video_state: self.video_state,
            direction: self.direction,
            conference_state: ConferenceState::Idle,
            main_call_id: None,
            account_number: self.account_number,
            account_id: self.account_id,
            start_time: now,
            state_changed_at: now,
            is_emergency: self.is_emergency,
            dial_scene: self.dial_scene,
            dial_type: self.dial_type,
            disconnect_cause: None,
            post_dial: self.post_dial,
            ims_call_mode,
            video: VideoAttributes {
                zoom_ratio: 1.0,
                ..VideoAttributes::default()
            },
            dtmf_active: None,
        }
    }
}

/// Options accepted by `dial_call`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DialCallOptions {
    /// SIM slot; the configured default slot when absent
    pub account_id: Option<SlotId>,
    pub video_state: VideoState,
    pub dial_scene: DialScene,
    pub dial_type: DialType,
}

impl DialCallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account_id(mut self, account_id: SlotId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_video_state(mut self, video_state: VideoState) -> Self {
        self.video_state = video_state;
        self
    }

    pub fn with_dial_scene(mut self, dial_scene: DialScene) -> Self {
        self.dial_scene = dial_scene;
        self
    }

    pub fn with_dial_type(mut self, dial_type: DialType) -> Self {
        self.dial_type = dial_type;
        self
    }
}

/// Optional SMS text sent back to the caller when rejecting
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RejectMessage {
    pub message: Option<String>,
}

impl RejectMessage {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

/// Inbound call reported by the radio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingCallInfo {
    pub number: String,
    pub account_id: SlotId,
    pub call_type: CallType,
    pub video_state: VideoState,
}

impl IncomingCallInfo {
    pub fn new(number: impl Into<String>, account_id: SlotId) -> Self {
        Self {
            number: number.into(),
            account_id,
            call_type: CallType::Cs,
            video_state: VideoState::Voice,
        }
    }

    pub fn with_call_type(mut self, call_type: CallType) -> Self {
        self.call_type = call_type;
        self
    }

    pub fn with_video_state(mut self, video_state: VideoState) -> Self {
        self.video_state = video_state;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_reason_codes_round_trip_for_known_values() {
        for code in [1u16, 16, 17, 21, 38, 247, 1279] {
            assert_eq!(DisconnectedReason::from_code(code).code(), code);
        }
        assert_eq!(DisconnectedReason::from_code(4242), DisconnectedReason::Other(4242));
    }

    #[test]
    fn test_unit_id_of_conference_member_is_main() {
        let mut record = NewCall::outgoing("10086", 0).into_record(CallId(3));
        assert_eq!(record.unit_id(), CallId(3));

        record.conference_state = ConferenceState::Active;
        record.main_call_id = Some(CallId(1));
        assert_eq!(record.unit_id(), CallId(1));
        assert!(!record.is_conference_main());
    }

    #[test]
    fn test_state_serializes_in_api_casing() {
        let json = serde_json::to_string(&CallState::Disconnecting).unwrap();
        assert_eq!(json, "\"DISCONNECTING\"");
    }
}
