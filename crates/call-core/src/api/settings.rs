use tracing::info;

use super::gateway::CallGateway;
use super::permissions::Permission;
use crate::errors::{CallError, CallResult};
use crate::services::supplementary::{
    CallRestrictionInfo, CallRestrictionType, CallTransferInfo, CallTransferResult, CallTransferType,
    CallWaitingStatus, RestrictionStatus, VoNrState, validate_restriction_password,
};
use crate::types::SlotId;

fn unavailable(op: &'static str) -> impl Fn(CallError) -> CallError {
    move |e| match e {
        CallError::InvalidArgument { .. } | CallError::Unsupported { .. } => e,
        other => CallError::service_unavailable(format!("{} failed: {}", op, other)),
    }
}

impl CallGateway {
    // ===== Call waiting =====

    pub async fn get_call_waiting(&self, slot: SlotId) -> CallResult<CallWaitingStatus> {
        self.require(Permission::GetTelephonyState)?;
        self.require_slot(slot)?;
        self.engine
            .radio()
            .get_call_waiting(slot)
            .await
            .map_err(unavailable("get call waiting"))
    }

    pub async fn set_call_waiting(&self, slot: SlotId, enabled: bool) -> CallResult<()> {
        self.require(Permission::SetTelephonyState)?;
        self.require_slot(slot)?;
        self.engine
            .radio()
            .set_call_waiting(slot, enabled)
            .await
            .map_err(unavailable("set call waiting"))?;
        info!("Call waiting on slot {} set to {}", slot, enabled);
        Ok(())
    }

    // ===== Call restriction =====

    pub async fn get_call_restriction(&self, slot: SlotId, kind: CallRestrictionType) -> CallResult<RestrictionStatus> {
        self.require(Permission::GetTelephonyState)?;
        self.require_slot(slot)?;
        self.engine
            .radio()
            .get_call_restriction(slot, kind)
            .await
            .map_err(unavailable("get call restriction"))
    }

    pub async fn set_call_restriction(&self, slot: SlotId, info: &CallRestrictionInfo) -> CallResult<()> {
        self.require(Permission::SetTelephonyState)?;
        self.require_slot(slot)?;
        info.validate()?;
        self.engine
            .radio()
            .set_call_restriction(slot, info)
            .await
            .map_err(unavailable("set call restriction"))
    }

    pub async fn set_call_restriction_password(
        &self,
        slot: SlotId,
        kind: CallRestrictionType,
        old_password: &str,
        new_password: &str,
    ) -> CallResult<()> {
        self.require(Permission::SetTelephonyState)?;
        self.require_slot(slot)?;
        validate_restriction_password(old_password)?;
        validate_restriction_password(new_password)?;
        if old_password == new_password {
            return Err(CallError::invalid_argument("new password must differ from the old one"));
        }
        self.engine
            .radio()
            .set_restriction_password(slot, kind, old_password, new_password)
            .await
            .map_err(unavailable("change restriction password"))
    }

    // ===== Call transfer =====

    pub async fn get_call_transfer_info(&self, slot: SlotId, kind: CallTransferType) -> CallResult<CallTransferResult> {
        self.require(Permission::GetTelephonyState)?;
        self.require_slot(slot)?;
        self.engine
            .radio()
            .get_call_transfer(slot, kind)
            .await
            .map_err(unavailable("get call transfer"))
    }

    pub async fn set_call_transfer_info(&self, slot: SlotId, info: &CallTransferInfo) -> CallResult<()> {
        self.require(Permission::SetTelephonyState)?;
        self.require_slot(slot)?;
        info.validate(self.config().max_number_len)?;
        self.engine
            .radio()
            .set_call_transfer(slot, info)
            .await
            .map_err(unavailable("set call transfer"))
    }

    // ===== IMS / VoNR =====

    pub async fn enable_ims_switch(&self, slot: SlotId) -> CallResult<()> {
        self.set_ims_switch(slot, true).await
    }

    pub async fn disable_ims_switch(&self, slot: SlotId) -> CallResult<()> {
        self.set_ims_switch(slot, false).await
    }

    async fn set_ims_switch(&self, slot: SlotId, enabled: bool) -> CallResult<()> {
        self.require(Permission::SetTelephonyState)?;
        self.require_slot(slot)?;
        self.engine
            .radio()
            .set_ims_switch(slot, enabled)
            .await
            .map_err(unavailable("set IMS switch"))
    }

    pub async fn is_ims_switch_enabled(&self, slot: SlotId) -> CallResult<bool> {
        self.require(Permission::GetTelephonyState)?;
        self.require_slot(slot)?;
        self.engine
            .radio()
            .get_ims_switch(slot)
            .await
            .map_err(unavailable("get IMS switch"))
    }

    pub async fn set_vonr_state(&self, slot: SlotId, state: VoNrState) -> CallResult<()> {
        self.require(Permission::SetTelephonyState)?;
        self.require_slot(slot)?;
        self.engine
            .radio()
            .set_vonr_state(slot, state)
            .await
            .map_err(unavailable("set VoNR state"))
    }

    pub async fn get_vonr_state(&self, slot: SlotId) -> CallResult<VoNrState> {
        self.require(Permission::GetTelephonyState)?;
        self.require_slot(slot)?;
        self.engine
            .radio()
            .get_vonr_state(slot)
            .await
            .map_err(unavailable("get VoNR state"))
    }
}
