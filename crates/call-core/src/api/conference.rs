use tracing::debug;

use super::gateway::CallGateway;
use super::permissions::Permission;
use crate::errors::{CallError, CallResult};
use crate::types::CallId;

impl CallGateway {
    // ===== Conference =====

    /// Merge `call_id` with every other established call on its slot
    pub async fn combine_conference(&self, call_id: CallId) -> CallResult<()> {
        self.require(Permission::AnswerCall)?;
        let record = self.require_call(call_id).await?;
        let own_unit = record.unit_id();
        let others: Vec<CallId> = self
            .engine
            .store()
            .list(|r| r.account_id == record.account_id && r.state.is_established() && r.unit_id() != own_unit)
            .await
            .iter()
            .map(|r| r.call_id)
            .collect();
        if others.is_empty() {
            return Err(CallError::invalid_state(format!(
                "no other call on slot {} to combine with call {}",
                record.account_id, call_id
            )));
        }
        debug!("Combining call {} with {:?}", call_id, others);
        self.engine
            .combine(call_id, &others)
            .await
            .map_err(CallError::into_api_error)
    }

    /// Form a conference from explicit call ids
    pub async fn combine_calls(&self, main: CallId, others: &[CallId]) -> CallResult<()> {
        self.require(Permission::AnswerCall)?;
        self.require_calls(main, others).await?;
        self.engine
            .combine(main, others)
            .await
            .map_err(CallError::into_api_error)
    }

    /// Add existing calls to the conference `main` belongs to
    pub async fn join_conference(&self, main: CallId, others: &[CallId]) -> CallResult<()> {
        self.require(Permission::AnswerCall)?;
        if others.is_empty() {
            return Err(CallError::invalid_argument("no calls to join"));
        }
        self.require_calls(main, others).await?;
        self.engine.join(main, others).await.map_err(CallError::into_api_error)
    }

    pub async fn separate_conference(&self, call_id: CallId) -> CallResult<()> {
        self.require(Permission::AnswerCall)?;
        self.require_call(call_id).await?;
        self.engine.separate(call_id).await.map_err(CallError::into_api_error)
    }

    pub async fn kick_out_from_conference(&self, call_id: CallId) -> CallResult<()> {
        self.require(Permission::AnswerCall)?;
        self.require_call(call_id).await?;
        self.engine.kick_out(call_id).await.map_err(CallError::into_api_error)
    }

    pub async fn get_main_call_id(&self, call_id: CallId) -> CallResult<Option<CallId>> {
        self.require_call(call_id).await?;
        self.engine
            .get_main_call_id(call_id)
            .await
            .map_err(CallError::into_api_error)
    }

    pub async fn get_sub_call_id_list(&self, call_id: CallId) -> CallResult<Vec<CallId>> {
        self.require_call(call_id).await?;
        self.engine
            .get_sub_call_id_list(call_id)
            .await
            .map_err(CallError::into_api_error)
    }

    pub async fn get_call_id_list_for_conference(&self, call_id: CallId) -> CallResult<Vec<CallId>> {
        self.require_call(call_id).await?;
        self.engine
            .get_call_id_list_for_conference(call_id)
            .await
            .map_err(CallError::into_api_error)
    }

    async fn require_calls(&self, main: CallId, others: &[CallId]) -> CallResult<()> {
        self.require_call(main).await?;
        for call_id in others {
            self.require_call(*call_id).await?;
        }
        Ok(())
    }
}
