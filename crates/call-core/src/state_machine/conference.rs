use std::collections::BTreeSet;
use tracing::info;

use super::{CallEngine, Effects};
use crate::errors::{CallError, CallResult};
use crate::state_table::EventType;
use crate::types::{CallId, CallState, ConferenceState};

impl CallEngine {
    // ===== Conference =====

    /// Form a conference around `host`, or grow the one it already belongs
    /// to. Every participant ends up ACTIVE. Nothing changes if any
    /// participant is unsuitable.
    pub async fn combine(&self, host: CallId, others: &[CallId]) -> CallResult<()> {
        self.merge(host, others, false).await
    }

    /// Add existing calls to the conference `host` belongs to
    pub async fn join(&self, host: CallId, others: &[CallId]) -> CallResult<()> {
        self.merge(host, others, true).await
    }

    async fn merge(&self, host: CallId, others: &[CallId], require_conference: bool) -> CallResult<()> {
        let _arbiter = self.arbiter.lock().await;

        let mut ids: BTreeSet<CallId> = others.iter().copied().collect();
        ids.insert(host);
        if ids.len() < 2 {
            return Err(CallError::invalid_argument("a conference needs at least two calls"));
        }

        let host_record = self.store.get(host).await?;
        let hosting = host_record.conference_state == ConferenceState::Active;
        if require_conference && !hosting {
            return Err(CallError::invalid_state(format!("call {} is not in a conference", host)));
        }
        let main = if hosting {
            host_record.main_call_id.unwrap_or(host)
        } else {
            host
        };
        if hosting {
            ids.extend(self.conference_members(main).await.iter().map(|r| r.call_id));
        }
        if ids.len() > self.config.max_conference_size {
            return Err(CallError::invalid_state(format!(
                "conference would have {} members, the limit is {}",
                ids.len(),
                self.config.max_conference_size
            )));
        }

        let ids: Vec<CallId> = ids.into_iter().collect();
        let mut guards = self.store.lock_many(&ids).await?;
        for guard in guards.iter() {
            if !guard.state.is_established() {
                return Err(CallError::invalid_state(format!(
                    "call {} is {} and cannot join a conference",
                    guard.call_id(),
                    guard.state
                )));
            }
            if guard.account_id != host_record.account_id {
                return Err(CallError::invalid_argument(format!(
                    "call {} is on slot {}, the conference is on slot {}",
                    guard.call_id(),
                    guard.account_id,
                    host_record.account_id
                )));
            }
            if guard.in_conference() && guard.main_call_id != Some(main) {
                return Err(CallError::invalid_state(format!(
                    "call {} already belongs to another conference",
                    guard.call_id()
                )));
            }
        }

        let outside_active = self
            .live_units()
            .await
            .into_iter()
            .any(|u| u.is_active() && u.members.iter().all(|m| !ids.contains(&m.call_id)));
        if outside_active {
            return Err(CallError::invalid_state(
                "another active call is not part of the conference",
            ));
        }

        let mut effects = Effects::default();
        for guard in guards.iter_mut() {
            if guard.state == CallState::Holding {
                self.apply_event(guard, EventType::Unhold, None, &mut effects)?;
            }
            guard.conference_state = ConferenceState::Active;
            guard.main_call_id = Some(main);
        }

        let members: Vec<CallId> = ids.iter().copied().filter(|id| *id != main).collect();
        self.radio
            .combine(main, &members)
            .await
            .map_err(|e| CallError::service_unavailable(format!("combine failed: {}", e)))?;
        self.commit_publish(&mut guards, effects)?;
        info!("Conference {} now has {} members", main, ids.len());
        Ok(())
    }

    /// Take a member out into a private call. It stays ACTIVE and the rest
    /// of the conference goes on hold.
    pub async fn separate(&self, call_id: CallId) -> CallResult<()> {
        let _arbiter = self.arbiter.lock().await;
        let (main, ids) = self.conference_of(call_id).await?;
        let mut guards = self.store.lock_many(&ids).await?;
        if guards.iter().any(|g| g.state != CallState::Active) {
            return Err(CallError::invalid_state(format!(
                "conference of call {} is not active",
                call_id
            )));
        }

        let mut effects = Effects::default();
        for guard in guards.iter_mut() {
            if guard.call_id() == call_id {
                guard.conference_state = ConferenceState::Idle;
                guard.main_call_id = None;
            } else {
                self.apply_event(guard, EventType::Hold, None, &mut effects)?;
            }
        }
        self.rebalance_conference(&mut guards, main);

        self.radio
            .separate(call_id)
            .await
            .map_err(|e| CallError::service_unavailable(format!("separate failed: {}", e)))?;
        self.commit_publish(&mut guards, effects)?;
        info!("Call {} separated from conference {}", call_id, main);
        Ok(())
    }

    /// Drop a member from its conference and hang up its leg
    pub async fn kick_out(&self, call_id: CallId) -> CallResult<()> {
        let _arbiter = self.arbiter.lock().await;
        let (main, ids) = self.conference_of(call_id).await?;
        let mut guards = self.store.lock_many(&ids).await?;
        let Some(index) = guards.iter().position(|g| g.call_id() == call_id) else {
            return Err(CallError::NotFound(call_id));
        };

        let mut effects = Effects::default();
        self.apply_event(&mut guards[index], EventType::Hangup, None, &mut effects)?;
        self.rebalance_conference(&mut guards, main);

        self.radio
            .kick_out(call_id)
            .await
            .map_err(|e| CallError::service_unavailable(format!("kick out failed: {}", e)))?;
        self.commit_publish(&mut guards, effects)?;
        info!("Call {} kicked out of conference {}", call_id, main);
        Ok(())
    }

    /// Main call id and every member id of the conference `call_id` is in
    async fn conference_of(&self, call_id: CallId) -> CallResult<(CallId, Vec<CallId>)> {
        let record = self.store.get(call_id).await?;
        let main = match (record.conference_state, record.main_call_id) {
            (ConferenceState::Active, Some(main)) => main,
            _ => {
                return Err(CallError::invalid_state(format!(
                    "call {} is not in a conference",
                    call_id
                )));
            }
        };
        let ids = self
            .conference_members(main)
            .await
            .iter()
            .map(|r| r.call_id)
            .collect();
        Ok((main, ids))
    }

    // ===== Conference queries =====

    /// Main call of the conference `call_id` belongs to
    pub async fn get_main_call_id(&self, call_id: CallId) -> CallResult<Option<CallId>> {
        let record = self.store.get(call_id).await?;
        Ok(if record.conference_state == ConferenceState::Active {
            record.main_call_id
        } else {
            None
        })
    }

    /// Members of the conference other than its main call
    pub async fn get_sub_call_id_list(&self, call_id: CallId) -> CallResult<Vec<CallId>> {
        let Some(main) = self.get_main_call_id(call_id).await? else {
            return Ok(Vec::new());
        };
        Ok(self
            .conference_members(main)
            .await
            .iter()
            .map(|r| r.call_id)
            .filter(|id| *id != main)
            .collect())
    }

    /// Every member of the conference, main first
    pub async fn get_call_id_list_for_conference(&self, call_id: CallId) -> CallResult<Vec<CallId>> {
        let Some(main) = self.get_main_call_id(call_id).await? else {
            return Ok(Vec::new());
        };
        let mut ids = vec![main];
        ids.extend(
            self.conference_members(main)
                .await
                .iter()
                .map(|r| r.call_id)
                .filter(|id| *id != main),
        );
        Ok(ids)
    }
}
