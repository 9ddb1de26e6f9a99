//! Call state machine engine
//!
//! [`CallEngine`] is the only writer of call records. Every command and
//! radio signal becomes a named [`EventType`] that is looked up in the master
//! state table; legal transitions are committed to the store and published
//! while the record locks are still held, so subscribers see the changes of
//! one call in the order they were accepted.
//!
//! Locking: operations that look at more than one call (dial, answer,
//! hold/unhold/switch, conference operations, network release) first take
//! the engine-wide arbiter and then the record locks in ascending id order.
//! Single-call operations (hang-up, network acceptance, DTMF, video) only
//! take the record lock.

mod calls;
mod conference;
mod media;
mod signals;

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::radio::{RadioLink, RadioSignal};
use crate::call_store::{CallStore, RecordGuard, RemoveOutcome};
use crate::config::CallManagerConfig;
use crate::errors::{CallError, CallResult};
use crate::events::{CallEvent, DeliveryReceipt, EventDispatcher};
use crate::services::audio::AudioRouter;
use crate::state_table::{EventTemplate, EventType, MASTER_TABLE, MasterStateTable};
use crate::types::{
    CallId, CallRecord, CallState, ConferenceState, DisconnectedDetails, DisconnectedReason,
};

/// Events owed for the records touched by one operation
#[derive(Debug, Default)]
pub(crate) struct Effects {
    templates: BTreeMap<CallId, Vec<EventTemplate>>,
}

impl Effects {
    fn add(&mut self, call_id: CallId, templates: &[EventTemplate]) {
        let owed = self.templates.entry(call_id).or_default();
        for template in templates {
            if !owed.contains(template) {
                owed.push(*template);
            }
        }
    }

    fn take(&mut self, call_id: CallId) -> Option<Vec<EventTemplate>> {
        self.templates.remove(&call_id)
    }
}

/// A call or a whole conference, moved between foreground and background as one
#[derive(Debug, Clone)]
pub(crate) struct Unit {
    pub(crate) id: CallId,
    pub(crate) members: Vec<CallRecord>,
}

impl Unit {
    pub(crate) fn member_ids(&self) -> Vec<CallId> {
        self.members.iter().map(|m| m.call_id).collect()
    }

    pub(crate) fn any(&self, predicate: impl Fn(CallState) -> bool) -> bool {
        self.members.iter().any(|m| predicate(m.state))
    }

    pub(crate) fn is_active(&self) -> bool {
        self.any(|s| s == CallState::Active)
    }

    pub(crate) fn is_holding(&self) -> bool {
        !self.members.is_empty() && self.members.iter().all(|m| m.state == CallState::Holding)
    }

    pub(crate) fn is_foreground(&self) -> bool {
        self.any(|s| s.is_foreground())
    }
}

/// Drives call records through the state table
pub struct CallEngine {
    config: Arc<CallManagerConfig>,
    store: Arc<CallStore>,
    dispatcher: Arc<EventDispatcher>,
    radio: Arc<dyn RadioLink>,
    table: Arc<MasterStateTable>,
    arbiter: Mutex<()>,
    audio: AudioRouter,
}

impl CallEngine {
    pub fn new(config: CallManagerConfig, radio: Arc<dyn RadioLink>) -> Arc<Self> {
        info!(
            "Creating call engine ({} slots, max {} calls)",
            config.slot_count, config.max_calls
        );
        Arc::new(Self {
            config: Arc::new(config),
            store: Arc::new(CallStore::new()),
            dispatcher: Arc::new(EventDispatcher::new()),
            radio,
            table: MASTER_TABLE.clone(),
            arbiter: Mutex::new(()),
            audio: AudioRouter::new(),
        })
    }

    pub fn config(&self) -> &CallManagerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CallStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn radio(&self) -> &Arc<dyn RadioLink> {
        &self.radio
    }

    /// Feed radio signals into the engine until the channel closes.
    ///
    /// The task only holds a weak reference, so dropping the engine ends it.
    pub fn spawn_signal_pump(self: &Arc<Self>, mut signals: mpsc::UnboundedReceiver<RadioSignal>) -> JoinHandle<()> {
        let engine = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                if let Err(e) = engine.handle_signal(signal).await {
                    warn!("Radio signal rejected: {}", e);
                }
            }
            debug!("Radio signal pump stopped");
        })
    }

    // ===== Transition helpers =====

    /// Apply a named event to a working copy. Returns `false` for accepted
    /// no-op edges.
    pub(crate) fn apply_event(
        &self,
        record: &mut CallRecord,
        event: EventType,
        cause: Option<DisconnectedDetails>,
        effects: &mut Effects,
    ) -> CallResult<bool> {
        let transition = self.table.get_transition(record.state, event).ok_or_else(|| {
            CallError::invalid_state(format!(
                "{} is not allowed for call {} in state {}",
                event.type_name(),
                record.call_id,
                record.state
            ))
        })?;
        let Some(next) = transition.next_state else {
            debug!("Call {}: {} ignored in {}", record.call_id, event.type_name(), record.state);
            return Ok(false);
        };

        debug!(
            "Call {}: {} --{}--> {}",
            record.call_id,
            record.state,
            event.type_name(),
            next
        );
        record.state = next;
        record.state_changed_at = Utc::now();
        match next {
            CallState::Disconnected => {
                record.disconnect_cause =
                    Some(cause.unwrap_or_else(|| DisconnectedDetails::new(DisconnectedReason::NormalCallClearing)));
                record.dtmf_active = None;
                record.post_dial = None;
                if record.conference_state != ConferenceState::Idle {
                    record.conference_state = ConferenceState::Disconnected;
                }
            }
            CallState::Disconnecting if record.in_conference() => {
                record.conference_state = ConferenceState::Disconnecting;
            }
            _ => {}
        }
        effects.add(record.call_id, &transition.publish_events);
        Ok(true)
    }

    /// Commit every guard as one change and publish what it owes.
    ///
    /// Must be called with the guards still held so the published order per
    /// call matches the commit order.
    pub(crate) fn commit_publish(&self, guards: &mut [RecordGuard], mut effects: Effects) -> CallResult<Vec<CallRecord>> {
        let before: Vec<(CallState, bool)> = guards
            .iter()
            .map(|g| (g.original().state, g.needs_publish()))
            .collect();
        let committed = self.store.commit_all(guards)?;

        for (record, (old_state, changed)) in committed.iter().zip(before) {
            let templates = match effects.take(record.call_id) {
                Some(templates) => templates,
                None if changed => vec![EventTemplate::StateChanged],
                None => continue,
            };
            let mut receipts = Vec::with_capacity(templates.len());
            for template in templates {
                let event = match template {
                    EventTemplate::StateChanged => CallEvent::CallDetailsChange(record.clone()),
                    EventTemplate::DisconnectedCause => CallEvent::CallDisconnectedCause {
                        call_id: record.call_id,
                        details: record
                            .disconnect_cause
                            .clone()
                            .unwrap_or_else(|| DisconnectedDetails::new(DisconnectedReason::Unknown)),
                    },
                };
                receipts.push(self.dispatcher.publish(event));
            }
            if record.state == CallState::Disconnected && old_state != CallState::Disconnected {
                self.schedule_reclaim(record.call_id, receipts);
            }
        }
        Ok(committed)
    }

    pub(crate) fn publish(&self, event: CallEvent) -> DeliveryReceipt {
        self.dispatcher.publish(event)
    }

    /// Remove a DISCONNECTED record once its last events are delivered and
    /// the retention window has passed
    fn schedule_reclaim(&self, call_id: CallId, receipts: Vec<DeliveryReceipt>) {
        let store = self.store.clone();
        let retention = self.config.disconnected_retention;
        tokio::spawn(async move {
            DeliveryReceipt::all_delivered(receipts).await;
            if !retention.is_zero() {
                tokio::time::sleep(retention).await;
            }
            match store.remove(call_id).await {
                Ok(RemoveOutcome::Removed) => debug!("Reclaimed call {}", call_id),
                Ok(outcome) => debug!("Reclaim of call {}: {:?}", call_id, outcome),
                Err(e) => warn!("Failed to reclaim call {}: {}", call_id, e),
            }
        });
    }

    // ===== Unit helpers =====

    /// Live calls grouped into units, by ascending unit id
    pub(crate) async fn live_units(&self) -> Vec<Unit> {
        let mut units: BTreeMap<CallId, Vec<CallRecord>> = BTreeMap::new();
        for record in self.store.list(|r| !r.state.is_ending()).await {
            units.entry(record.unit_id()).or_default().push(record);
        }
        units
            .into_iter()
            .map(|(id, members)| Unit { id, members })
            .collect()
    }

    /// The unit `call_id` belongs to
    pub(crate) async fn unit_of(&self, call_id: CallId) -> CallResult<Unit> {
        let record = self.store.get(call_id).await?;
        if record.conference_state == ConferenceState::Active {
            if let Some(main) = record.main_call_id {
                return Ok(Unit {
                    id: main,
                    members: self.conference_members(main).await,
                });
            }
        }
        Ok(Unit {
            id: call_id,
            members: vec![record],
        })
    }

    /// Records currently in the conference hosted by `main`
    pub(crate) async fn conference_members(&self, main: CallId) -> Vec<CallRecord> {
        self.store
            .list(|r| r.conference_state == ConferenceState::Active && r.main_call_id == Some(main))
            .await
    }

    /// Dissolve or re-elect after members left the conference hosted by
    /// `main`. `guards` must cover every record of that conference.
    pub(crate) fn rebalance_conference(&self, guards: &mut [RecordGuard], main: CallId) {
        let live: Vec<usize> = guards
            .iter()
            .enumerate()
            .filter(|(_, g)| g.conference_state == ConferenceState::Active && g.main_call_id == Some(main))
            .map(|(i, _)| i)
            .collect();

        if live.len() < 2 {
            for i in live {
                info!("Conference {} dissolved; call {} is a single call again", main, guards[i].call_id());
                guards[i].conference_state = ConferenceState::Idle;
                guards[i].main_call_id = None;
            }
            return;
        }

        if live.iter().any(|&i| guards[i].call_id() == main) {
            return;
        }
        let Some(new_main) = live.iter().map(|&i| guards[i].call_id()).min() else {
            return;
        };
        info!("Conference main {} left; call {} is the new main", main, new_main);
        for i in live {
            guards[i].main_call_id = Some(new_main);
        }
    }

    /// Reset audio once nothing is live any more
    pub(crate) async fn release_audio_if_idle(&self) {
        if !self.store.list(|r| !r.state.is_ending()).await.is_empty() {
            return;
        }
        if let Some(info) = self.audio.reset_for_idle() {
            self.publish(CallEvent::AudioDeviceChange(info));
        }
    }
}

impl std::fmt::Debug for CallEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallEngine")
            .field("config", &self.config)
            .field("transitions", &self.table.transition_count())
            .finish()
    }
}
