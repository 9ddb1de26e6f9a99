//! Carrier supplementary services configured per SIM slot: call waiting,
//! call restriction (barring) and call transfer (forwarding).

use serde::{Deserialize, Serialize};

use crate::errors::{CallError, CallResult};
use crate::utils::number::DialString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallWaitingStatus {
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallRestrictionType {
    AllIncoming,
    AllOutgoing,
    InternationalOutgoing,
    InternationalExcludingHome,
    RoamingIncoming,
    AllCalls,
    OutgoingServices,
    IncomingServices,
}

impl CallRestrictionType {
    pub fn from_code(code: i32) -> CallResult<Self> {
        let value = match code {
            0 => CallRestrictionType::AllIncoming,
            1 => CallRestrictionType::AllOutgoing,
            2 => CallRestrictionType::InternationalOutgoing,
            3 => CallRestrictionType::InternationalExcludingHome,
            4 => CallRestrictionType::RoamingIncoming,
            5 => CallRestrictionType::AllCalls,
            6 => CallRestrictionType::OutgoingServices,
            7 => CallRestrictionType::IncomingServices,
            other => {
                return Err(CallError::invalid_argument(format!("invalid restriction type {}", other)));
            }
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallRestrictionMode {
    Deactivation,
    Activation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestrictionStatus {
    NotRegistered,
    Activated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRestrictionInfo {
    pub restriction_type: CallRestrictionType,
    pub password: String,
    pub mode: CallRestrictionMode,
}

impl CallRestrictionInfo {
    pub fn validate(&self) -> CallResult<()> {
        validate_restriction_password(&self.password)
    }
}

/// Barring passwords are exactly four digits
pub fn validate_restriction_password(password: &str) -> CallResult<()> {
    if password.len() == 4 && password.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(CallError::invalid_argument("restriction password must be four digits"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallTransferType {
    Unconditional,
    Busy,
    NoReply,
    NotReachable,
}

impl CallTransferType {
    pub fn from_code(code: i32) -> CallResult<Self> {
        match code {
            0 => Ok(CallTransferType::Unconditional),
            1 => Ok(CallTransferType::Busy),
            2 => Ok(CallTransferType::NoReply),
            3 => Ok(CallTransferType::NotReachable),
            other => Err(CallError::invalid_argument(format!("invalid transfer type {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallTransferSettingType {
    Disable,
    Enable,
    Registration,
    Erasure,
}

impl CallTransferSettingType {
    /// Wire values are 0, 1, 3 and 4; 2 is unassigned
    pub fn from_code(code: i32) -> CallResult<Self> {
        match code {
            0 => Ok(CallTransferSettingType::Disable),
            1 => Ok(CallTransferSettingType::Enable),
            3 => Ok(CallTransferSettingType::Registration),
            4 => Ok(CallTransferSettingType::Erasure),
            other => Err(CallError::invalid_argument(format!("invalid transfer setting type {}", other))),
        }
    }

    pub fn needs_number(&self) -> bool {
        matches!(self, CallTransferSettingType::Enable | CallTransferSettingType::Registration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTransferInfo {
    pub transfer_num: String,
    pub setting_type: CallTransferSettingType,
    pub transfer_type: CallTransferType,
}

impl CallTransferInfo {
    pub fn validate(&self, max_number_len: usize) -> CallResult<()> {
        if self.setting_type.needs_number() {
            let parsed = DialString::parse(&self.transfer_num, max_number_len)?;
            if parsed.post_dial.is_some() {
                return Err(CallError::invalid_argument("transfer number cannot carry post-dial digits"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTransferResult {
    pub status: TransferStatus,
    pub number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoNrState {
    Off,
    On,
}
