use parking_lot::{Mutex, RwLock as SyncRwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::guard::{CallEntry, RecordGuard};
use crate::errors::{CallError, CallResult};
use crate::types::{CallId, CallRecord, CallState, NewCall};

/// Result of [`CallStore::remove`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// Already gone
    Absent,
    /// Still named as conference main by another record; removed once the
    /// last reference goes away
    Deferred,
}

/// Authoritative collection of call records, keyed by call id.
///
/// Mutations of one record are serialized by that record's writer lock;
/// different records are mutated concurrently. The index lock is only held
/// briefly by `create`, `remove` and lookups.
pub struct CallStore {
    index: RwLock<BTreeMap<CallId, Arc<CallEntry>>>,
    next_id: AtomicU32,
    /// Shared by snapshot readers, exclusive while several records commit
    /// together so readers never see half of a compound change
    publish: SyncRwLock<()>,
    deferred: Mutex<BTreeSet<CallId>>,
}

impl CallStore {
    /// Create a new call store
    pub fn new() -> Self {
        Self {
            index: RwLock::new(BTreeMap::new()),
            next_id: AtomicU32::new(1),
            publish: SyncRwLock::new(()),
            deferred: Mutex::new(BTreeSet::new()),
        }
    }

    /// Insert a record under a fresh id
    pub async fn create(&self, initial: NewCall) -> CallResult<CallId> {
        let mut guard = self.create_locked(initial).await?;
        guard.commit()?;
        Ok(guard.call_id())
    }

    /// Reserve an id and return the new record locked.
    ///
    /// The record stays invisible to readers until the guard commits, so a
    /// creator whose setup fails can [`discard`](Self::discard) it without
    /// anyone having observed it. Dropping the guard uncommitted discards
    /// it too; the next `list` clears its index entry.
    pub async fn create_locked(&self, initial: NewCall) -> CallResult<RecordGuard> {
        let raw = self.next_id.fetch_add(1, Ordering::SeqCst);
        if raw == 0 || raw == u32::MAX {
            return Err(CallError::internal("call id space exhausted"));
        }
        let call_id = CallId(raw);
        let entry = Arc::new(CallEntry::new_hidden(initial.into_record(call_id)));
        let writer = entry
            .writer
            .clone()
            .try_lock_owned()
            .map_err(|_| CallError::internal(format!("fresh record {} is already locked", call_id)))?;

        self.index.write().await.insert(call_id, entry.clone());
        info!("Created call record {}", call_id);

        Ok(RecordGuard::new_fresh(entry, writer))
    }

    /// Drop a record that was created locked and never committed. Its id is
    /// not reused.
    pub async fn discard(&self, mut guard: RecordGuard) -> CallResult<()> {
        if !guard.is_fresh() {
            return Err(CallError::invalid_state(format!(
                "call {} is already visible and cannot be discarded",
                guard.call_id()
            )));
        }
        let call_id = guard.call_id();
        guard.retire();
        self.index.write().await.remove(&call_id);
        debug!("Discarded call record {}", call_id);
        Ok(())
    }

    async fn entry(&self, call_id: CallId) -> Option<Arc<CallEntry>> {
        self.index.read().await.get(&call_id).cloned()
    }

    /// Get a snapshot of a record
    pub async fn get(&self, call_id: CallId) -> CallResult<CallRecord> {
        let entry = self.entry(call_id).await.ok_or(CallError::NotFound(call_id))?;
        let _publish = self.publish.read();
        entry.snapshot().ok_or(CallError::NotFound(call_id))
    }

    pub async fn contains(&self, call_id: CallId) -> bool {
        self.get(call_id).await.is_ok()
    }

    /// Lock a record for exclusive mutation
    pub async fn lock(&self, call_id: CallId) -> CallResult<RecordGuard> {
        let entry = self.entry(call_id).await.ok_or(CallError::NotFound(call_id))?;
        let writer = entry.writer.clone().lock_owned().await;
        RecordGuard::new(entry, writer).map_err(|_| CallError::NotFound(call_id))
    }

    /// Lock several records in ascending id order. Fails with `NotFound`
    /// (holding nothing) if any id is missing.
    pub async fn lock_many(&self, call_ids: &[CallId]) -> CallResult<Vec<RecordGuard>> {
        let ids: BTreeSet<CallId> = call_ids.iter().copied().collect();
        let mut guards = Vec::with_capacity(ids.len());
        for call_id in ids {
            guards.push(self.lock(call_id).await?);
        }
        Ok(guards)
    }

    /// Apply a mutation atomically.
    ///
    /// The mutator works on a scratch copy which is committed only when it
    /// returns `Ok`. DISCONNECTED records are immutable.
    pub async fn update<R, F>(&self, call_id: CallId, mutator: F) -> CallResult<R>
    where
        F: FnOnce(&mut CallRecord) -> CallResult<R>,
    {
        let mut guard = self.lock(call_id).await?;
        if guard.state == CallState::Disconnected {
            return Err(CallError::invalid_state(format!("call {} is disconnected", call_id)));
        }
        let result = mutator(&mut *guard)?;
        guard.commit()?;
        Ok(result)
    }

    /// Commit several locked records as one change
    pub fn commit_all(&self, guards: &mut [RecordGuard]) -> CallResult<Vec<CallRecord>> {
        for guard in guards.iter() {
            guard.check_commit()?;
        }
        let _publish = self.publish.write();
        let mut committed = Vec::with_capacity(guards.len());
        for guard in guards.iter_mut() {
            if guard.needs_publish() {
                guard.publish();
            }
            committed.push(guard.original().clone());
        }
        Ok(committed)
    }

    /// Delete a DISCONNECTED record. Removing an absent record is not an error.
    pub async fn remove(&self, call_id: CallId) -> CallResult<RemoveOutcome> {
        let outcome = self.remove_one(call_id).await?;
        if outcome == RemoveOutcome::Removed {
            self.sweep_deferred().await;
        }
        Ok(outcome)
    }

    async fn remove_one(&self, call_id: CallId) -> CallResult<RemoveOutcome> {
        let Some(entry) = self.entry(call_id).await else {
            self.deferred.lock().remove(&call_id);
            return Ok(RemoveOutcome::Absent);
        };
        let _writer = entry.writer.clone().lock_owned().await;
        let (removed, hidden, state) = {
            let slot = entry.committed.read();
            (slot.removed, slot.hidden, slot.record.state)
        };
        if removed {
            self.index.write().await.remove(&call_id);
            return Ok(RemoveOutcome::Absent);
        }
        if hidden {
            return Ok(RemoveOutcome::Absent);
        }
        if state != CallState::Disconnected {
            return Err(CallError::invalid_state(format!(
                "call {} is {} and cannot be removed",
                call_id, state
            )));
        }

        let referenced = !self
            .list(|r| r.call_id != call_id && r.main_call_id == Some(call_id))
            .await
            .is_empty();
        if referenced {
            debug!("Deferring removal of call {}: still named as conference main", call_id);
            self.deferred.lock().insert(call_id);
            return Ok(RemoveOutcome::Deferred);
        }

        self.index.write().await.remove(&call_id);
        entry.committed.write().removed = true;
        self.deferred.lock().remove(&call_id);
        info!("Removed call record {}", call_id);
        Ok(RemoveOutcome::Removed)
    }

    /// Retry deferred removals until no more progress is made
    pub async fn sweep_deferred(&self) {
        loop {
            let candidates: Vec<CallId> = self.deferred.lock().iter().copied().collect();
            let mut progressed = false;
            for call_id in candidates {
                match self.remove_one(call_id).await {
                    Ok(RemoveOutcome::Removed) => progressed = true,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Dropping deferred removal of call {}: {}", call_id, e);
                        self.deferred.lock().remove(&call_id);
                    }
                }
            }
            if !progressed {
                break;
            }
        }
    }

    /// Snapshots of every record matching `predicate`, by ascending call id
    pub async fn list<P>(&self, predicate: P) -> Vec<CallRecord>
    where
        P: Fn(&CallRecord) -> bool,
    {
        let entries: Vec<(CallId, Arc<CallEntry>)> = self
            .index
            .read()
            .await
            .iter()
            .map(|(call_id, entry)| (*call_id, entry.clone()))
            .collect();
        let records = {
            let _publish = self.publish.read();
            entries
                .iter()
                .filter_map(|(_, entry)| entry.snapshot())
                .filter(|record| predicate(record))
                .collect()
        };

        let retired: Vec<CallId> = entries
            .iter()
            .filter(|(_, entry)| entry.is_retired())
            .map(|(call_id, _)| *call_id)
            .collect();
        if !retired.is_empty() {
            self.forget(&retired).await;
        }
        records
    }

    /// Drop index entries of records that were created locked and abandoned
    /// without a commit
    async fn forget(&self, retired: &[CallId]) {
        let mut index = self.index.write().await;
        for call_id in retired {
            if index.get(call_id).is_some_and(|entry| entry.is_retired()) {
                index.remove(call_id);
                debug!("Forgot abandoned call record {}", call_id);
            }
        }
    }

    /// Number of visible records
    pub async fn len(&self) -> usize {
        self.list(|_| true).await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Get store statistics
    pub async fn stats(&self) -> StoreStats {
        let mut stats = StoreStats::default();
        for record in self.list(|_| true).await {
            stats.total += 1;
            *stats.by_state.entry(record.state).or_insert(0) += 1;
            if record.in_conference() {
                stats.in_conference += 1;
            }
        }
        stats.deferred = self.deferred.lock().len();
        stats
    }
}

impl Default for CallStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Store statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StoreStats {
    pub total: usize,
    pub by_state: BTreeMap<CallState, usize>,
    pub in_conference: usize,
    pub deferred: usize,
}

impl StoreStats {
    pub fn count(&self, state: CallState) -> usize {
        self.by_state.get(&state).copied().unwrap_or(0)
    }
}
