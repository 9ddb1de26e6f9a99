use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use super::dispatcher::SubscriptionId;
use super::types::CallEvent;

/// Channel-backed subscription returned by
/// [`EventDispatcher::subscribe_channel`](super::EventDispatcher::subscribe_channel).
///
/// Dropping it closes the backing subscriptions; the dispatcher forgets
/// them on its next publish or subscribe.
pub struct EventSubscriber {
    ids: Vec<SubscriptionId>,
    closed: Vec<Arc<AtomicBool>>,
    receiver: mpsc::UnboundedReceiver<CallEvent>,
}

impl EventSubscriber {
    pub(crate) fn new(
        ids: Vec<SubscriptionId>,
        closed: Vec<Arc<AtomicBool>>,
        receiver: mpsc::UnboundedReceiver<CallEvent>,
    ) -> Self {
        Self { ids, closed, receiver }
    }

    /// Subscription ids backing this channel, one per event kind
    pub fn subscription_ids(&self) -> &[SubscriptionId] {
        &self.ids
    }

    /// Receive the next event; `None` once every backing subscription is gone
    pub async fn recv(&mut self) -> Option<CallEvent> {
        self.receiver.recv().await
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Option<CallEvent> {
        self.receiver.try_recv().ok()
    }

    /// Everything currently queued
    pub fn drain(&mut self) -> Vec<CallEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for EventSubscriber {
    fn drop(&mut self) {
        for closed in &self.closed {
            closed.store(true, Ordering::Release);
        }
    }
}
