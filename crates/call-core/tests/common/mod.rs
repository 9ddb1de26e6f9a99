//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use telcall_core::{
    CallEvent, CallGateway, CallId, CallManagerConfig, CallRecord, CallState, DialCallOptions, DialOutcome,
    EventSubscriber, LoopbackRadio,
};

const WAIT_LIMIT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Gateway wired to a loopback radio
pub struct Harness {
    pub gateway: CallGateway,
    pub radio: Arc<LoopbackRadio>,
}

/// Config that reclaims ended calls right away
pub fn fast_config() -> CallManagerConfig {
    CallManagerConfig::default().with_disconnected_retention(Duration::ZERO)
}

pub fn harness() -> Harness {
    harness_with(fast_config(), |radio| radio)
}

pub fn harness_with(config: CallManagerConfig, tune: impl FnOnce(LoopbackRadio) -> LoopbackRadio) -> Harness {
    init_tracing();
    let (radio, signals) = LoopbackRadio::new();
    let radio = Arc::new(tune(radio));
    let gateway = CallGateway::new(config, radio.clone()).unwrap();
    gateway.attach_signals(signals);
    Harness { gateway, radio }
}

/// Route engine logs through the test harness; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll until the call reaches `state`
pub async fn wait_for_state(gateway: &CallGateway, call_id: CallId, state: CallState) -> CallRecord {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    loop {
        if let Ok(record) = gateway.get_call(call_id).await {
            if record.state == state {
                return record;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            panic!(
                "call {} never reached {} (now {:?})",
                call_id,
                state,
                gateway.get_call(call_id).await.map(|r| r.state)
            );
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Poll until the record has been reclaimed
pub async fn wait_until_gone(gateway: &CallGateway, call_id: CallId) {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while gateway.get_call(call_id).await.is_ok() {
        if tokio::time::Instant::now() >= deadline {
            panic!("call {} was never reclaimed", call_id);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Dial `number` and drive it to ACTIVE through the radio
pub async fn connected_call(h: &Harness, number: &str) -> CallId {
    let outcome = h.gateway.dial_call(number, DialCallOptions::new()).await.unwrap();
    let DialOutcome::Call(call_id) = outcome else {
        panic!("{} was treated as an MMI code", number);
    };
    h.radio.network_accepted(call_id);
    wait_for_state(&h.gateway, call_id, CallState::Alerting).await;
    h.radio.remote_answered(call_id);
    wait_for_state(&h.gateway, call_id, CallState::Active).await;
    call_id
}

/// Receive events until `pred` matches one, returning everything seen
pub async fn collect_until(
    subscriber: &mut EventSubscriber,
    mut pred: impl FnMut(&CallEvent) -> bool,
) -> Vec<CallEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(WAIT_LIMIT, subscriber.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        let done = pred(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// States of the `callDetailsChange` events about `call_id`, in order
pub fn states_of(events: &[CallEvent], call_id: CallId) -> Vec<CallState> {
    events
        .iter()
        .filter_map(|event| match event {
            CallEvent::CallDetailsChange(record) if record.call_id == call_id => Some(record.state),
            _ => None,
        })
        .collect()
}
