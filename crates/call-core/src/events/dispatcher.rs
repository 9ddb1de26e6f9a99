use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{RwLock as GateLock, mpsc};
use tracing::{debug, warn};

use super::receipt::{DeliveryReceipt, ReceiptToken};
use super::subscriber::EventSubscriber;
use super::types::{CallEvent, EventKind};

/// Token returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receives call events
#[async_trait]
pub trait CallEventHandler: Send + Sync {
    async fn handle(&self, event: &CallEvent);
}

/// Adapts a plain closure into a handler
struct FnHandler<F>(F);

#[async_trait]
impl<F> CallEventHandler for FnHandler<F>
where
    F: Fn(&CallEvent) + Send + Sync,
{
    async fn handle(&self, event: &CallEvent) {
        (self.0)(event)
    }
}

tokio::task_local! {
    /// Subscription whose handler is running on the current delivery task
    static DELIVERING: SubscriptionId;
}

struct Envelope {
    event: Arc<CallEvent>,
    _token: ReceiptToken,
}

struct Subscription {
    kind: EventKind,
    queue: mpsc::UnboundedSender<Envelope>,
    closed: Arc<AtomicBool>,
    /// Held shared by the delivery task while a handler runs
    gate: Arc<GateLock<()>>,
}

/// Fans call events out to subscribers.
///
/// Delivery preserves publish order per subscription. The engine publishes
/// while it still holds the record lock, which makes the order per call id
/// the order in which transitions were accepted.
pub struct EventDispatcher {
    subscriptions: RwLock<BTreeMap<SubscriptionId, Subscription>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler for one event kind. Only events published after
    /// this call returns are delivered to it.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn CallEventHandler>) -> SubscriptionId {
        self.register(kind, handler).0
    }

    fn register(&self, kind: EventKind, handler: Arc<dyn CallEventHandler>) -> (SubscriptionId, Arc<AtomicBool>) {
        self.prune_closed();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (queue, mut rx) = mpsc::unbounded_channel::<Envelope>();
        let closed = Arc::new(AtomicBool::new(false));
        let gate = Arc::new(GateLock::new(()));

        let task_closed = closed.clone();
        let task_gate = gate.clone();
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let _open = task_gate.read().await;
                if task_closed.load(Ordering::Acquire) {
                    // Drain so outstanding receipts resolve
                    continue;
                }
                let delivery = DELIVERING.scope(id, handler.handle(&envelope.event));
                if AssertUnwindSafe(delivery).catch_unwind().await.is_err() {
                    warn!("Handler for {} panicked on {}", id, envelope.event.kind());
                }
            }
            debug!("Delivery task for {} finished", id);
        });

        self.subscriptions.write().insert(
            id,
            Subscription {
                kind,
                queue,
                closed: closed.clone(),
                gate,
            },
        );
        debug!("Subscribed {} to {}", id, kind);
        (id, closed)
    }

    /// Register a closure for one event kind
    pub fn subscribe_fn<F>(&self, kind: EventKind, f: F) -> SubscriptionId
    where
        F: Fn(&CallEvent) + Send + Sync + 'static,
    {
        self.subscribe(kind, Arc::new(FnHandler(f)))
    }

    /// Receive events of the given kinds through a channel
    pub fn subscribe_channel(&self, kinds: &[EventKind]) -> EventSubscriber {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ids, closed): (Vec<_>, Vec<_>) = kinds
            .iter()
            .map(|kind| {
                let tx = tx.clone();
                let handler = FnHandler(move |event: &CallEvent| {
                    let _ = tx.send(event.clone());
                });
                self.register(*kind, Arc::new(handler))
            })
            .unzip();
        EventSubscriber::new(ids, closed, rx)
    }

    /// Remove a subscription.
    ///
    /// When this returns the handler is not running and will not be called
    /// again. Called from inside the handler itself, it returns immediately
    /// and the current invocation is the last one.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscriptions.write().remove(&id);
        let Some(subscription) = removed else {
            return false;
        };
        subscription.closed.store(true, Ordering::Release);

        let inside_own_handler = DELIVERING.try_with(|current| *current == id).unwrap_or(false);
        if !inside_own_handler {
            // Wait for an in-flight delivery to finish
            let _ = subscription.gate.write().await;
        }
        debug!("Unsubscribed {}", id);
        true
    }

    /// Queue an event for every current subscriber of its kind
    pub fn publish(&self, event: CallEvent) -> DeliveryReceipt {
        let kind = event.kind();
        let subscriptions = self.subscriptions.read();
        let recipients: Vec<&Subscription> = subscriptions
            .values()
            .filter(|s| s.kind == kind && !s.closed.load(Ordering::Acquire))
            .collect();

        let stale = recipients.len() < subscriptions.values().filter(|s| s.kind == kind).count();

        let (receipt, tokens) = DeliveryReceipt::with_recipients(recipients.len());
        let event = Arc::new(event);
        for (subscription, token) in recipients.into_iter().zip(tokens) {
            // A closed queue hands the envelope back; dropping it releases the token
            let _ = subscription.queue.send(Envelope {
                event: event.clone(),
                _token: token,
            });
        }
        drop(subscriptions);
        if stale {
            self.prune_closed();
        }
        receipt
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.prune_closed();
        self.subscriptions.read().values().filter(|s| s.kind == kind).count()
    }

    /// Forget subscriptions whose channel receiver was dropped. Removing the
    /// queue sender ends their delivery tasks.
    fn prune_closed(&self) {
        let mut subscriptions = self.subscriptions.write();
        subscriptions.retain(|id, subscription| {
            let open = !subscription.closed.load(Ordering::Acquire);
            if !open {
                debug!("Dropped subscription {} with no receiver", id);
            }
            open
        });
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CallId, CallState, NewCall};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn details(id: u32, state: CallState) -> CallEvent {
        CallEvent::CallDetailsChange(NewCall::outgoing("10086", 0).with_state(state).into_record(CallId(id)))
    }

    #[tokio::test]
    async fn test_publish_reaches_matching_kind_only() {
        let dispatcher = EventDispatcher::new();
        let mut details_rx = dispatcher.subscribe_channel(&[EventKind::CallDetailsChange]);
        let mut cause_rx = dispatcher.subscribe_channel(&[EventKind::CallDisconnectedCause]);

        dispatcher.publish(details(1, CallState::Dialing)).delivered().await;

        assert!(details_rx.try_recv().is_some());
        assert!(cause_rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_receipt_waits_for_slow_handler() {
        let dispatcher = EventDispatcher::new();
        let handled = Arc::new(AtomicUsize::new(0));
        let counter = handled.clone();

        struct Slow(Arc<AtomicUsize>);

        #[async_trait]
        impl CallEventHandler for Slow {
            async fn handle(&self, _event: &CallEvent) {
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        dispatcher.subscribe(EventKind::CallDetailsChange, Arc::new(Slow(counter)));
        let receipt = dispatcher.publish(details(1, CallState::Dialing));
        assert_eq!(receipt.pending(), 1);
        receipt.delivered().await;
        assert_eq!(handled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_channel_subscriber_is_forgotten() {
        let dispatcher = EventDispatcher::new();
        let mut kept = dispatcher.subscribe_channel(&[EventKind::CallDetailsChange]);
        for _ in 0..100 {
            drop(dispatcher.subscribe_channel(&[EventKind::CallDetailsChange, EventKind::PostDialDelay]));
        }

        assert_eq!(dispatcher.subscriber_count(EventKind::CallDetailsChange), 1);
        assert_eq!(dispatcher.subscriber_count(EventKind::PostDialDelay), 0);
        assert_eq!(dispatcher.subscriptions.read().len(), 1);

        dispatcher.publish(details(1, CallState::Dialing)).delivered().await;
        assert_eq!(kept.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_id_returns_false() {
        let dispatcher = EventDispatcher::new();
        assert!(!dispatcher.unsubscribe(SubscriptionId(42)).await);
    }

    #[tokio::test]
    async fn test_panicking_handler_keeps_receiving() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        dispatcher.subscribe_fn(EventKind::CallDetailsChange, move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first delivery fails");
            }
        });

        dispatcher.publish(details(1, CallState::Dialing)).delivered().await;
        dispatcher.publish(details(1, CallState::Alerting)).delivered().await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
