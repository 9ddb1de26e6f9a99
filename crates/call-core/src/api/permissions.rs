use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::errors::{CallError, CallResult};

/// Capability a gateway caller may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    PlaceCall,
    AnswerCall,
    SetTelephonyState,
    GetTelephonyState,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::PlaceCall,
        Permission::AnswerCall,
        Permission::SetTelephonyState,
        Permission::GetTelephonyState,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::PlaceCall => "ohos.permission.PLACE_CALL",
            Permission::AnswerCall => "ohos.permission.ANSWER_CALL",
            Permission::SetTelephonyState => "ohos.permission.SET_TELEPHONY_STATE",
            Permission::GetTelephonyState => "ohos.permission.GET_TELEPHONY_STATE",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities granted to one gateway
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    granted: BTreeSet<Permission>,
}

impl PermissionSet {
    pub fn all() -> Self {
        Self {
            granted: Permission::ALL.into_iter().collect(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, permission: Permission) -> Self {
        self.granted.insert(permission);
        self
    }

    pub fn without(mut self, permission: Permission) -> Self {
        self.granted.remove(&permission);
        self
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.granted.contains(&permission)
    }

    /// `PermissionDenied` unless `permission` is granted
    pub fn check(&self, permission: Permission) -> CallResult<()> {
        if self.contains(permission) {
            Ok(())
        } else {
            Err(CallError::permission_denied(format!("{} is required", permission)))
        }
    }
}
