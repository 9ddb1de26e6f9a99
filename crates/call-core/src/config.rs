//! Call manager configuration
//!
//! [`CallManagerConfig`] carries the device limits the engine enforces and the
//! policies it applies. It can be built fluently or loaded from TOML:
//!
//! ```rust
//! use telcall_core::config::CallManagerConfig;
//! use std::time::Duration;
//!
//! let config = CallManagerConfig::new()
//!     .with_slot_count(1)
//!     .with_max_calls(4)
//!     .with_disconnected_retention(Duration::from_millis(200));
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.slot_count, 1);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::{CallError, CallResult};
use crate::types::SlotId;

/// Longest number the radio accepts
pub const MAX_NUMBER_LEN: usize = 255;

/// Longest SMS text attached to a reject
pub const MAX_REJECT_MESSAGE_LEN: usize = 300;

/// Largest CS conference the network supports
pub const DEFAULT_MAX_CONFERENCE_SIZE: usize = 5;

/// Configuration for the call engine and gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallManagerConfig {
    /// Number of SIM slots on the device
    pub slot_count: u32,

    /// Slot used when a dial does not name one
    pub default_slot: SlotId,

    /// Maximum number of live (not ending) calls; emergency calls are exempt
    pub max_calls: usize,

    /// Maximum number of legs in one conference
    pub max_conference_size: usize,

    /// How long a DISCONNECTED record stays queryable after every subscriber
    /// has seen the transition
    #[serde(with = "duration_millis")]
    pub disconnected_retention: Duration,

    /// Numbers always dialed as emergency calls
    pub emergency_numbers: Vec<String>,

    /// Maximum accepted number length
    pub max_number_len: usize,
}

impl Default for CallManagerConfig {
    fn default() -> Self {
        Self {
            slot_count: 2,
            default_slot: 0,
            max_calls: 6,
            max_conference_size: DEFAULT_MAX_CONFERENCE_SIZE,
            disconnected_retention: Duration::from_secs(2),
            emergency_numbers: ["110", "112", "119", "120", "911", "999", "000", "08", "118", "122"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_number_len: MAX_NUMBER_LEN,
        }
    }
}

impl CallManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot_count(mut self, slot_count: u32) -> Self {
        self.slot_count = slot_count;
        self
    }

    pub fn with_default_slot(mut self, slot: SlotId) -> Self {
        self.default_slot = slot;
        self
    }

    pub fn with_max_calls(mut self, max_calls: usize) -> Self {
        self.max_calls = max_calls;
        self
    }

    pub fn with_max_conference_size(mut self, size: usize) -> Self {
        self.max_conference_size = size;
        self
    }

    pub fn with_disconnected_retention(mut self, retention: Duration) -> Self {
        self.disconnected_retention = retention;
        self
    }

    pub fn with_emergency_numbers<I, S>(mut self, numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.emergency_numbers = numbers.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> CallResult<()> {
        if self.slot_count == 0 {
            return Err(CallError::config("slot_count must be at least 1"));
        }
        if self.default_slot >= self.slot_count {
            return Err(CallError::config(format!(
                "default_slot {} is outside the {} configured slots",
                self.default_slot, self.slot_count
            )));
        }
        if self.max_calls == 0 {
            return Err(CallError::config("max_calls must be at least 1"));
        }
        if self.max_conference_size < 2 {
            return Err(CallError::config("max_conference_size must be at least 2"));
        }
        if self.max_number_len == 0 || self.max_number_len > MAX_NUMBER_LEN {
            return Err(CallError::config(format!(
                "max_number_len must be between 1 and {}",
                MAX_NUMBER_LEN
            )));
        }
        Ok(())
    }

    pub fn is_valid_slot(&self, slot: SlotId) -> bool {
        slot < self.slot_count
    }

    pub fn is_emergency_number(&self, number: &str) -> bool {
        self.emergency_numbers.iter().any(|n| n == number)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> CallResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| CallError::config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> CallResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CallError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
