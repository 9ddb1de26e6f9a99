use tracing::{debug, info, warn};

use super::{CallEngine, Effects, Unit};
use crate::adapters::radio::DialRequest;
use crate::call_store::RecordGuard;
use crate::errors::{CallError, CallResult};
use crate::events::{CallAbilityEventId, CallEvent, CallEventInfo};
use crate::state_table::EventType;
use crate::types::{
    CallId, CallState, DisconnectedDetails, DisconnectedReason, IncomingCallInfo, NewCall, VideoState,
};
use crate::utils::number::PostDialSplit;

impl CallEngine {
    // ===== Outgoing calls =====

    /// Place a call. The active unit, if any, is put on hold first.
    pub async fn dial(&self, call: NewCall) -> CallResult<CallId> {
        let _arbiter = self.arbiter.lock().await;
        let units = self.live_units().await;
        let live = units.iter().map(|u| u.members.len()).sum::<usize>();

        if !call.is_emergency {
            if live >= self.config.max_calls {
                return Err(CallError::invalid_state(format!(
                    "cannot dial: {} calls already exist",
                    live
                )));
            }
            if units.iter().any(|u| u.any(|s| s.is_ringing())) {
                return Err(CallError::invalid_state("cannot dial while a call is ringing"));
            }
        }
        if units.iter().any(|u| u.any(|s| s.is_outgoing_setup())) {
            return Err(CallError::invalid_state("another outgoing call is being set up"));
        }

        // The hold of the active unit and the new record commit together
        let mut staged = Vec::new();
        let mut effects = Effects::default();
        let mut held_unit = None;
        if let Some(active) = units.iter().find(|u| u.is_active()) {
            if units.iter().any(|u| u.is_holding()) {
                return Err(CallError::invalid_state(
                    "cannot dial: an active and a held call already exist",
                ));
            }
            staged = self.stage_hold(active, &mut effects).await?;
            held_unit = Some(active.id);
        }

        let number = call.account_number.clone();
        let mut guard = self.store.create_locked(call).await?;
        self.apply_event(&mut guard, EventType::Dial, None, &mut effects)?;

        let request = DialRequest {
            call_id: guard.call_id(),
            number: number.clone(),
            account_id: guard.account_id,
            call_type: guard.call_type,
            video_state: guard.video_state,
            dial_scene: guard.dial_scene,
            is_emergency: guard.is_emergency,
        };
        if let Err(e) = self.radio.dial(&request).await {
            warn!("Dial of call {} failed: {}", request.call_id, e);
            if let Some(unit_id) = held_unit {
                self.restore_held(unit_id).await;
            }
            drop(staged);
            self.store.discard(guard).await?;
            self.publish(CallEvent::CallEventChange(CallEventInfo {
                call_id: None,
                event_id: CallAbilityEventId::DialNoCarrier,
                number,
            }));
            return Err(CallError::service_unavailable(format!("dial failed: {}", e)));
        }

        let call_id = guard.call_id();
        staged.push(guard);
        self.commit_publish(&mut staged, effects)?;
        info!("Dialing call {} on slot {}", call_id, request.account_id);
        Ok(call_id)
    }

    // ===== Incoming calls =====

    /// Record a call reported by the network. It rings as INCOMING, or goes
    /// on to WAITING when other calls are already live.
    pub async fn handle_incoming(&self, incoming: IncomingCallInfo) -> CallResult<CallId> {
        let _arbiter = self.arbiter.lock().await;
        let live = self.store.list(|r| !r.state.is_ending()).await;
        if live.len() >= self.config.max_calls {
            return Err(CallError::invalid_state(format!(
                "incoming call from {} dropped: {} calls already exist",
                incoming.number,
                live.len()
            )));
        }

        let call = NewCall::incoming(incoming.number, incoming.account_id)
            .with_call_type(incoming.call_type)
            .with_video_state(incoming.video_state);
        let mut guard = self.store.create_locked(call).await?;
        let mut effects = Effects::default();
        self.apply_event(&mut guard, EventType::IncomingRing, None, &mut effects)?;
        self.commit_publish(std::slice::from_mut(&mut guard), effects)?;

        if !live.is_empty() {
            let mut effects = Effects::default();
            self.apply_event(&mut guard, EventType::WaitingIndication, None, &mut effects)?;
            self.commit_publish(std::slice::from_mut(&mut guard), effects)?;
        }
        info!("Incoming call {} is {}", guard.call_id(), guard.state);
        Ok(guard.call_id())
    }

    /// Answer a ringing call, holding the active unit first
    pub async fn answer(&self, call_id: CallId, video_state: VideoState) -> CallResult<()> {
        let _arbiter = self.arbiter.lock().await;
        let record = self.store.get(call_id).await?;
        if !record.state.is_ringing() {
            return Err(CallError::invalid_state(format!(
                "call {} is {} and cannot be answered",
                call_id, record.state
            )));
        }

        let units = self.live_units().await;
        let others: Vec<&Unit> = units.iter().filter(|u| u.id != call_id).collect();
        if others.iter().any(|u| u.any(|s| s.is_outgoing_setup())) {
            return Err(CallError::invalid_state(
                "cannot answer while an outgoing call is being set up",
            ));
        }
        let mut staged = Vec::new();
        let mut effects = Effects::default();
        let mut held_unit = None;
        if let Some(active) = others.iter().find(|u| u.is_active()) {
            if others.iter().any(|u| u.is_holding()) {
                return Err(CallError::invalid_state(
                    "cannot answer: an active and a held call already exist",
                ));
            }
            staged = self.stage_hold(active, &mut effects).await?;
            held_unit = Some(active.id);
        }

        let mut guard = self.store.lock(call_id).await?;
        self.apply_event(&mut guard, EventType::Answer, None, &mut effects)?;
        if video_state != guard.video_state {
            guard.video_state = video_state;
        }
        if let Err(e) = self.radio.answer(call_id, video_state).await {
            if let Some(unit_id) = held_unit {
                self.restore_held(unit_id).await;
            }
            return Err(CallError::service_unavailable(format!("answer failed: {}", e)));
        }
        staged.push(guard);
        self.commit_publish(&mut staged, effects)?;
        info!("Answered call {}", call_id);
        Ok(())
    }

    /// Decline a ringing call
    pub async fn reject(&self, call_id: CallId, message: Option<&str>) -> CallResult<()> {
        let _arbiter = self.arbiter.lock().await;
        let mut guard = self.store.lock(call_id).await?;
        let mut effects = Effects::default();
        let details = DisconnectedDetails::new(DisconnectedReason::CallRejected);
        self.apply_event(&mut guard, EventType::Reject, Some(details), &mut effects)?;
        self.radio
            .reject(call_id, message)
            .await
            .map_err(|e| CallError::service_unavailable(format!("reject failed: {}", e)))?;
        self.commit_publish(std::slice::from_mut(&mut guard), effects)?;
        drop(guard);

        info!("Rejected call {}", call_id);
        self.release_audio_if_idle().await;
        Ok(())
    }

    /// Start hanging up. The record becomes DISCONNECTED when the network
    /// confirms the release. Repeated hang-ups succeed without effect.
    pub async fn hang_up(&self, call_id: CallId) -> CallResult<()> {
        let mut guard = self.store.lock(call_id).await?;
        let mut effects = Effects::default();
        if !self.apply_event(&mut guard, EventType::Hangup, None, &mut effects)? {
            return Ok(());
        }
        self.radio
            .hang_up(call_id)
            .await
            .map_err(|e| CallError::service_unavailable(format!("hang up failed: {}", e)))?;
        self.commit_publish(std::slice::from_mut(&mut guard), effects)?;
        info!("Hanging up call {}", call_id);
        Ok(())
    }

    // ===== Hold / unhold / switch =====

    /// Put the unit `call_id` belongs to on hold
    pub async fn hold(&self, call_id: CallId) -> CallResult<()> {
        let _arbiter = self.arbiter.lock().await;
        let unit = self.unit_of(call_id).await?;
        self.hold_unit(&unit).await.inspect_err(|e| {
            if matches!(e, CallError::ServiceUnavailable { .. }) {
                self.report_ability_failure(call_id, CallAbilityEventId::HoldCallFailed);
            }
        })
    }

    /// Bring a held unit back. Fails while another unit is in the foreground.
    pub async fn unhold(&self, call_id: CallId) -> CallResult<()> {
        let _arbiter = self.arbiter.lock().await;
        let unit = self.unit_of(call_id).await?;
        let units = self.live_units().await;
        if units.iter().any(|u| u.id != unit.id && u.is_foreground()) {
            return Err(CallError::invalid_state(format!(
                "cannot unhold call {} while another call is in the foreground",
                call_id
            )));
        }

        let mut guards = self.store.lock_many(&unit.member_ids()).await?;
        let mut effects = Effects::default();
        for guard in guards.iter_mut() {
            self.apply_event(guard, EventType::Unhold, None, &mut effects)?;
        }
        self.radio
            .unhold(unit.id)
            .await
            .map_err(|e| CallError::service_unavailable(format!("unhold failed: {}", e)))?;
        self.commit_publish(&mut guards, effects)?;
        info!("Unheld unit {}", unit.id);
        Ok(())
    }

    /// Hold the active unit and resume the held unit `call_id` belongs to
    pub async fn switch(&self, call_id: CallId) -> CallResult<()> {
        let _arbiter = self.arbiter.lock().await;
        let held = self.unit_of(call_id).await?;
        if !held.is_holding() {
            return Err(CallError::invalid_state(format!("call {} is not on hold", call_id)));
        }
        let units = self.live_units().await;
        let Some(active) = units.into_iter().find(|u| u.id != held.id && u.is_active()) else {
            return Err(CallError::invalid_state("no active call to switch with"));
        };

        let mut ids = active.member_ids();
        ids.extend(held.member_ids());
        let mut guards = self.store.lock_many(&ids).await?;
        let mut effects = Effects::default();
        for guard in guards.iter_mut() {
            let event = if guard.unit_id() == held.id {
                EventType::Unhold
            } else {
                EventType::Hold
            };
            self.apply_event(guard, event, None, &mut effects)?;
        }
        if let Err(e) = self.radio.switch(active.id, held.id).await {
            self.report_ability_failure(call_id, CallAbilityEventId::SwapCallFailed);
            return Err(CallError::service_unavailable(format!("switch failed: {}", e)));
        }
        self.commit_publish(&mut guards, effects)?;
        info!("Switched: unit {} held, unit {} active", active.id, held.id);
        Ok(())
    }

    /// Hold every member of `unit`. Caller holds the arbiter.
    pub(crate) async fn hold_unit(&self, unit: &Unit) -> CallResult<()> {
        let mut effects = Effects::default();
        let mut guards = self.stage_hold(unit, &mut effects).await?;
        self.commit_publish(&mut guards, effects)?;
        debug!("Held unit {}", unit.id);
        Ok(())
    }

    /// Lock `unit`, move its members to HOLDING in the working copies and
    /// ask the radio to hold it. Nothing is committed; dropping the guards
    /// rolls the records back.
    async fn stage_hold(&self, unit: &Unit, effects: &mut Effects) -> CallResult<Vec<RecordGuard>> {
        let mut guards = self.store.lock_many(&unit.member_ids()).await?;
        for guard in guards.iter_mut() {
            self.apply_event(guard, EventType::Hold, None, effects)?;
        }
        self.radio
            .hold(unit.id)
            .await
            .map_err(|e| CallError::service_unavailable(format!("hold failed: {}", e)))?;
        Ok(guards)
    }

    /// Undo a radio hold whose records were never committed
    async fn restore_held(&self, unit_id: CallId) {
        match self.radio.unhold(unit_id).await {
            Ok(()) => debug!("Resumed unit {} after a failed request", unit_id),
            Err(e) => warn!("Failed to resume unit {} on the radio: {}", unit_id, e),
        }
    }

    fn report_ability_failure(&self, call_id: CallId, event_id: CallAbilityEventId) {
        self.publish(CallEvent::CallEventChange(CallEventInfo {
            call_id: Some(call_id),
            event_id,
            number: String::new(),
        }));
    }

    // ===== Network driven transitions =====

    pub(crate) async fn network_accepted(&self, call_id: CallId) -> CallResult<()> {
        let mut guard = self.store.lock(call_id).await?;
        let mut effects = Effects::default();
        self.apply_event(&mut guard, EventType::NetworkAccepted, None, &mut effects)?;
        self.commit_publish(std::slice::from_mut(&mut guard), effects)?;
        Ok(())
    }

    pub(crate) async fn remote_answered(&self, call_id: CallId) -> CallResult<()> {
        let _arbiter = self.arbiter.lock().await;
        let mut guard = self.store.lock(call_id).await?;
        let mut effects = Effects::default();
        self.apply_event(&mut guard, EventType::RemoteAnswered, None, &mut effects)?;
        self.commit_publish(std::slice::from_mut(&mut guard), effects)?;
        info!("Call {} connected", call_id);

        if guard.post_dial.is_some() {
            self.continue_post_dial(&mut guard).await?;
        }
        Ok(())
    }

    /// Network release or abort. Conference peers are rebalanced in the
    /// same commit.
    pub(crate) async fn disconnect(
        &self,
        call_id: CallId,
        event: EventType,
        details: DisconnectedDetails,
    ) -> CallResult<()> {
        let _arbiter = self.arbiter.lock().await;
        let record = self.store.get(call_id).await?;
        let main = record.in_conference().then(|| record.unit_id());

        let mut ids = vec![call_id];
        if let Some(main) = main {
            ids.extend(
                self.store
                    .list(|r| r.in_conference() && r.main_call_id == Some(main))
                    .await
                    .iter()
                    .map(|r| r.call_id),
            );
        }
        let mut guards = self.store.lock_many(&ids).await?;
        let Some(index) = guards.iter().position(|g| g.call_id() == call_id) else {
            return Err(CallError::NotFound(call_id));
        };

        let mut effects = Effects::default();
        if !self.apply_event(&mut guards[index], event, Some(details), &mut effects)? {
            return Ok(());
        }
        if let Some(main) = main {
            self.rebalance_conference(&mut guards, main);
        }
        self.commit_publish(&mut guards, effects)?;
        drop(guards);

        info!("Call {} disconnected", call_id);
        self.release_audio_if_idle().await;
        Ok(())
    }

    // ===== Post-dial =====

    /// Send post-dial digits up to the next wait. Leftovers stay on the
    /// record and are announced with `postDialDelay`.
    pub(crate) async fn continue_post_dial(&self, guard: &mut RecordGuard) -> CallResult<()> {
        let Some(sequence) = guard.post_dial.clone() else {
            return Ok(());
        };
        let split = PostDialSplit::next(&sequence);
        if split.has_digits() {
            self.radio
                .send_post_dial(guard.call_id(), &split.send_now)
                .await
                .map_err(|e| CallError::service_unavailable(format!("post-dial failed: {}", e)))?;
        }
        guard.post_dial = split.after_wait.clone();
        self.commit_publish(std::slice::from_mut(guard), Effects::default())?;

        if let Some(remaining) = split.after_wait {
            debug!("Call {} waits before post-dial {}", guard.call_id(), remaining);
            self.publish(CallEvent::PostDialDelay {
                call_id: guard.call_id(),
                remaining,
            });
        }
        Ok(())
    }

    /// Continue or abandon a post-dial sequence paused at a wait
    pub async fn post_dial_proceed(&self, call_id: CallId, proceed: bool) -> CallResult<()> {
        let mut guard = self.store.lock(call_id).await?;
        if guard.state != CallState::Active {
            return Err(CallError::invalid_state(format!("call {} is {}", call_id, guard.state)));
        }
        if guard.post_dial.is_none() {
            return Err(CallError::invalid_state(format!(
                "call {} has no pending post-dial digits",
                call_id
            )));
        }
        if proceed {
            self.continue_post_dial(&mut guard).await
        } else {
            guard.post_dial = None;
            self.commit_publish(std::slice::from_mut(&mut guard), Effects::default())?;
            Ok(())
        }
    }
}
