use parking_lot::RwLock;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::errors::{CallError, CallResult};
use crate::types::{CallId, CallRecord, CallState};

/// Committed contents of one store entry
pub(crate) struct Slot {
    pub(crate) record: CallRecord,
    pub(crate) removed: bool,
    /// Created but not yet committed by its creator
    pub(crate) hidden: bool,
}

/// One record in the store: a writer lock serializing mutations and the
/// last committed snapshot readers see.
pub(crate) struct CallEntry {
    pub(crate) writer: Arc<Mutex<()>>,
    pub(crate) committed: RwLock<Slot>,
}

impl CallEntry {
    pub(crate) fn new_hidden(record: CallRecord) -> Self {
        Self {
            writer: Arc::new(Mutex::new(())),
            committed: RwLock::new(Slot {
                record,
                removed: false,
                hidden: true,
            }),
        }
    }

    /// Retired before ever being published
    pub(crate) fn is_retired(&self) -> bool {
        let slot = self.committed.read();
        slot.removed && slot.hidden
    }

    pub(crate) fn snapshot(&self) -> Option<CallRecord> {
        let slot = self.committed.read();
        if slot.removed || slot.hidden {
            None
        } else {
            Some(slot.record.clone())
        }
    }
}

/// Exclusive access to one call record.
///
/// Changes are made to a private working copy. Nothing becomes visible to
/// readers until [`commit`](RecordGuard::commit) (or
/// [`CallStore::commit_all`](super::CallStore::commit_all)); dropping the
/// guard without committing discards them.
pub struct RecordGuard {
    pub(crate) entry: Arc<CallEntry>,
    _writer: OwnedMutexGuard<()>,
    original: CallRecord,
    working: CallRecord,
    /// Set on records created through this guard until their first commit
    fresh: bool,
}

impl RecordGuard {
    pub(crate) fn new(entry: Arc<CallEntry>, writer: OwnedMutexGuard<()>) -> CallResult<Self> {
        let original = {
            let slot = entry.committed.read();
            if slot.removed || slot.hidden {
                return Err(CallError::NotFound(slot.record.call_id));
            }
            slot.record.clone()
        };
        Ok(Self {
            entry,
            _writer: writer,
            working: original.clone(),
            original,
            fresh: false,
        })
    }

    pub(crate) fn new_fresh(entry: Arc<CallEntry>, writer: OwnedMutexGuard<()>) -> Self {
        let original = entry.committed.read().record.clone();
        Self {
            entry,
            _writer: writer,
            working: original.clone(),
            original,
            fresh: true,
        }
    }

    pub fn call_id(&self) -> CallId {
        self.original.call_id
    }

    /// Record as last committed
    pub fn original(&self) -> &CallRecord {
        &self.original
    }

    pub fn is_dirty(&self) -> bool {
        self.original != self.working
    }

    /// Whether the record has never been visible to readers
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub(crate) fn needs_publish(&self) -> bool {
        self.fresh || self.is_dirty()
    }

    /// Throw away uncommitted changes
    pub fn rollback(&mut self) {
        self.working = self.original.clone();
    }

    pub(crate) fn check_commit(&self) -> CallResult<()> {
        if self.original.state == CallState::Disconnected && self.is_dirty() {
            return Err(CallError::invalid_state(format!(
                "call {} is disconnected and can no longer change",
                self.original.call_id
            )));
        }
        Ok(())
    }

    pub(crate) fn publish(&mut self) {
        {
            let mut slot = self.entry.committed.write();
            slot.record = self.working.clone();
            slot.hidden = false;
        }
        self.original = self.working.clone();
        self.fresh = false;
    }

    /// Mark a never-published record as gone
    pub(crate) fn retire(&mut self) {
        self.entry.committed.write().removed = true;
        self.fresh = false;
    }

    /// Make the working copy visible to readers. The lock stays held until
    /// the guard is dropped.
    pub fn commit(&mut self) -> CallResult<CallRecord> {
        self.check_commit()?;
        if self.needs_publish() {
            self.publish();
        }
        Ok(self.original.clone())
    }
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        // A creator that never committed leaves nothing behind
        if self.fresh {
            self.retire();
        }
    }
}

impl Deref for RecordGuard {
    type Target = CallRecord;

    fn deref(&self) -> &CallRecord {
        &self.working
    }
}

impl DerefMut for RecordGuard {
    fn deref_mut(&mut self) -> &mut CallRecord {
        &mut self.working
    }
}

impl std::fmt::Debug for RecordGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordGuard")
            .field("call_id", &self.original.call_id)
            .field("state", &self.working.state)
            .field("dirty", &self.is_dirty())
            .field("fresh", &self.fresh)
            .finish()
    }
}
