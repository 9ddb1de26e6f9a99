use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::CallResult;

pub const CONTACTS_BUNDLE_NAME: &str = "com.ohos.contacts";
pub const CONTACTS_ABILITY_NAME: &str = "com.ohos.contacts.MainAbility";
pub const PAGE_FLAG_EDIT_BEFORE_CALLING: &str = "page_flag_edit_before_calling";

/// Request to start a host ability (a dialer screen)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityRequest {
    pub bundle_name: String,
    pub ability_name: String,
    pub parameters: BTreeMap<String, String>,
}

impl AbilityRequest {
    /// Open the contacts dialer with `number` pre-filled for editing
    pub fn edit_before_calling(number: &str) -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert("phoneNumber".to_string(), number.to_string());
        parameters.insert("pageFlag".to_string(), PAGE_FLAG_EDIT_BEFORE_CALLING.to_string());
        Self {
            bundle_name: CONTACTS_BUNDLE_NAME.to_string(),
            ability_name: CONTACTS_ABILITY_NAME.to_string(),
            parameters,
        }
    }
}

/// Host environment able to launch abilities
#[async_trait]
pub trait AbilityHost: Send + Sync {
    async fn start_ability(&self, request: AbilityRequest) -> CallResult<()>;
}

/// Host that only records what it was asked to start
#[derive(Default)]
pub struct RecordingAbilityHost {
    requests: Mutex<Vec<AbilityRequest>>,
}

impl RecordingAbilityHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<AbilityRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AbilityHost for RecordingAbilityHost {
    async fn start_ability(&self, request: AbilityRequest) -> CallResult<()> {
        tracing::info!("Starting ability {}/{}", request.bundle_name, request.ability_name);
        self.requests.lock().push(request);
        Ok(())
    }
}
