use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

struct ReceiptState {
    pending: AtomicUsize,
    notify: Notify,
}

/// Resolves once every subscription an event was queued for has handled
/// (or skipped) it.
pub struct DeliveryReceipt {
    state: Arc<ReceiptState>,
}

/// Held by a queued event; dropping it marks one delivery finished
pub(crate) struct ReceiptToken {
    state: Arc<ReceiptState>,
}

impl DeliveryReceipt {
    /// A receipt and one token per recipient
    pub(crate) fn with_recipients(count: usize) -> (Self, Vec<ReceiptToken>) {
        let state = Arc::new(ReceiptState {
            pending: AtomicUsize::new(count),
            notify: Notify::new(),
        });
        let tokens = (0..count)
            .map(|_| ReceiptToken {
                state: state.clone(),
            })
            .collect();
        (Self { state }, tokens)
    }

    /// Receipt for an event nobody was subscribed to
    pub fn complete() -> Self {
        Self::with_recipients(0).0
    }

    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.pending() == 0
    }

    /// Wait until every recipient is done with the event
    pub async fn delivered(self) {
        while self.state.pending.load(Ordering::Acquire) > 0 {
            self.state.notify.notified().await;
        }
    }

    /// Wait for several receipts
    pub async fn all_delivered(receipts: Vec<DeliveryReceipt>) {
        futures::future::join_all(receipts.into_iter().map(|r| r.delivered())).await;
    }
}

impl Drop for ReceiptToken {
    fn drop(&mut self) {
        if self.state.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Single waiter; notify_one keeps a permit if it is not parked yet
            self.state.notify.notify_one();
        }
    }
}

impl std::fmt::Debug for DeliveryReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryReceipt").field("pending", &self.pending()).finish()
    }
}
