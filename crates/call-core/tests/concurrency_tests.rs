//! Racing commands against each other and against radio signals

mod common;

use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use common::*;
use telcall_core::{CallState, ConferenceState, DialCallOptions, IncomingCallInfo};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_hold_races_hang_up() {
    for _ in 0..20 {
        let h = Arc::new(harness());
        let call_id = connected_call(&h, "10086").await;

        let holder = {
            let h = h.clone();
            tokio::spawn(async move { h.gateway.hold_call(call_id).await })
        };
        let hanger = {
            let h = h.clone();
            tokio::spawn(async move { h.gateway.hang_up_call(call_id).await })
        };

        hanger.await.unwrap().unwrap();
        if let Err(e) = holder.await.unwrap() {
            // Lost the race: the call was already ending or gone
            assert!(e.is_invalid_state() || e.is_invalid_argument(), "unexpected error {}", e);
        }
        wait_until_gone(&h.gateway, call_id).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_incoming_burst_respects_call_limit() {
    let h = Arc::new(harness());
    let attempts = (0..20).map(|i| {
        let h = h.clone();
        tokio::spawn(async move {
            h.gateway
                .handle_incoming_call(IncomingCallInfo::new(format!("1380000{:04}", i), 0))
                .await
        })
    });
    let results: Vec<_> = join_all(attempts).await.into_iter().map(|r| r.unwrap()).collect();

    let accepted: BTreeSet<_> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    assert_eq!(accepted.len(), h.gateway.config().max_calls);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.is_invalid_state()));

    // Exactly one rings as INCOMING, the rest wait behind it
    let calls = h.gateway.list_calls().await;
    assert_eq!(calls.iter().filter(|c| c.state == CallState::Incoming).count(), 1);
    assert_eq!(
        calls.iter().filter(|c| c.state == CallState::Waiting).count(),
        accepted.len() - 1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dials_place_one_call() {
    let h = Arc::new(harness());
    let attempts = (0..10).map(|_| {
        let h = h.clone();
        tokio::spawn(async move { h.gateway.dial_call("10086", DialCallOptions::new()).await })
    });
    let results: Vec<_> = join_all(attempts).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(h.gateway.list_calls().await.len(), 1);
    assert_eq!(h.radio.ops().iter().filter(|op| **op == "dial").count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_half_a_conference() {
    let h = Arc::new(harness());
    let first = connected_call(&h, "10086").await;
    let second = connected_call(&h, "10010").await;

    let stop = Arc::new(AtomicBool::new(false));
    let reader = {
        let h = h.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            let mut observations = 0usize;
            while !stop.load(Ordering::SeqCst) {
                let in_conference = h
                    .gateway
                    .list_calls()
                    .await
                    .iter()
                    .filter(|r| r.conference_state == ConferenceState::Active)
                    .count();
                assert!(in_conference == 0 || in_conference == 2, "saw {} members", in_conference);
                observations += 1;
                tokio::task::yield_now().await;
            }
            observations
        })
    };

    h.gateway.combine_calls(second, &[first]).await.unwrap();
    h.gateway.separate_conference(first).await.unwrap();
    h.gateway.combine_calls(first, &[second]).await.unwrap();
    stop.store(true, Ordering::SeqCst);

    assert!(reader.await.unwrap() > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_release_during_switch_keeps_states_consistent() {
    let h = Arc::new(harness());
    let first = connected_call(&h, "10086").await;
    let second = connected_call(&h, "10010").await;

    let switcher = {
        let h = h.clone();
        tokio::spawn(async move { h.gateway.switch_call(first).await })
    };
    h.radio.release(second, telcall_core::DisconnectedReason::NormalCallClearing);
    let _ = switcher.await.unwrap();

    wait_until_gone(&h.gateway, second).await;
    // Either order leaves the surviving call settled
    let survivor = h.gateway.get_call(first).await.unwrap();
    assert!(matches!(survivor.state, CallState::Active | CallState::Holding));
}
