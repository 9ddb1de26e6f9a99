//! Conference formation, growth and teardown

mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::time::Duration;

use telcall_core::{CallId, DialCallOptions, CallState, ConferenceState, IncomingCallInfo, VideoState};

/// Two connected calls: the first held, the second active
async fn two_calls(h: &Harness) -> (CallId, CallId) {
    let first = connected_call(h, "10086").await;
    let second = connected_call(h, "10010").await;
    (first, second)
}

/// Answer a fresh incoming call, holding whatever is active
async fn answer_incoming(h: &Harness, number: &str) -> CallId {
    let call_id = h
        .gateway
        .handle_incoming_call(IncomingCallInfo::new(number, 0))
        .await
        .unwrap();
    h.gateway.answer_call(call_id, VideoState::Voice).await.unwrap();
    call_id
}

async fn conference_state(h: &Harness, call_id: CallId) -> ConferenceState {
    h.gateway.get_call(call_id).await.unwrap().conference_state
}

#[tokio::test]
async fn test_combine_conference_merges_held_call() {
    let h = harness();
    let (first, second) = two_calls(&h).await;

    h.gateway.combine_conference(second).await.unwrap();

    for call_id in [first, second] {
        let record = h.gateway.get_call(call_id).await.unwrap();
        assert_eq!(record.state, CallState::Active);
        assert_eq!(record.conference_state, ConferenceState::Active);
        assert_eq!(record.main_call_id, Some(second));
    }
    assert_eq!(h.gateway.get_main_call_id(first).await.unwrap(), Some(second));
    assert_eq!(h.gateway.get_sub_call_id_list(second).await.unwrap(), vec![first]);
    assert_eq!(
        h.gateway.get_call_id_list_for_conference(first).await.unwrap(),
        vec![second, first]
    );
    assert!(h.radio.ops().contains(&"combine"));
}

#[tokio::test]
async fn test_combine_with_unknown_call_changes_nothing() {
    let h = harness();
    let first = connected_call(&h, "10086").await;

    let err = h.gateway.combine_calls(first, &[CallId(99)]).await.unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(conference_state(&h, first).await, ConferenceState::Idle);
    assert_eq!(h.gateway.get_main_call_id(first).await.unwrap(), None);
}

#[tokio::test]
async fn test_unknown_ids_fail_without_waiting_for_the_engine() {
    let h = harness_with(fast_config(), |radio| radio.with_latency(Duration::from_millis(300)));

    // A slow dial keeps the engine busy while the lookups run
    let dial = h.gateway.dial_call("10086", DialCallOptions::new());
    let lookups = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio::time::timeout(Duration::from_millis(150), async {
            vec![
                h.gateway.combine_calls(CallId(90), &[CallId(91)]).await.unwrap_err(),
                h.gateway.join_conference(CallId(90), &[CallId(91)]).await.unwrap_err(),
                h.gateway.get_main_call_id(CallId(90)).await.unwrap_err(),
                h.gateway.get_sub_call_id_list(CallId(90)).await.unwrap_err(),
                h.gateway.get_call_id_list_for_conference(CallId(90)).await.unwrap_err(),
            ]
        })
        .await
        .expect("validation waited for the engine")
    };
    let (dialed, errors) = tokio::join!(dial, lookups);

    assert!(dialed.unwrap().call_id().is_some());
    assert_eq!(errors.len(), 5);
    assert!(errors.iter().all(|e| e.is_invalid_argument()));
}

#[tokio::test]
async fn test_combine_is_all_or_nothing() {
    let h = harness();
    let (first, second) = two_calls(&h).await;
    let ringing = h
        .gateway
        .handle_incoming_call(IncomingCallInfo::new("13800000000", 0))
        .await
        .unwrap();
    assert_eq!(h.gateway.get_call(ringing).await.unwrap().state, CallState::Waiting);

    let err = h.gateway.combine_calls(second, &[first, ringing]).await.unwrap_err();
    assert!(err.is_invalid_state());

    assert_eq!(h.gateway.get_call(first).await.unwrap().state, CallState::Holding);
    for call_id in [first, second, ringing] {
        assert_eq!(conference_state(&h, call_id).await, ConferenceState::Idle);
    }
    assert!(!h.radio.ops().contains(&"combine"));
}

#[tokio::test]
async fn test_combine_needs_another_call() {
    let h = harness();
    let only = connected_call(&h, "10086").await;
    assert!(h.gateway.combine_conference(only).await.unwrap_err().is_invalid_state());
    assert!(h.gateway.combine_calls(only, &[only]).await.unwrap_err().is_invalid_argument());
    assert!(h.gateway.join_conference(only, &[]).await.unwrap_err().is_invalid_argument());
}

#[tokio::test]
async fn test_join_grows_the_conference() {
    let h = harness();
    let (first, second) = two_calls(&h).await;
    h.gateway.combine_conference(second).await.unwrap();

    // Answering puts the whole conference on hold
    let third = answer_incoming(&h, "13800000000").await;
    assert_eq!(h.gateway.get_call(first).await.unwrap().state, CallState::Holding);
    assert_eq!(h.gateway.get_call(second).await.unwrap().state, CallState::Holding);

    h.gateway.join_conference(second, &[third]).await.unwrap();
    assert_eq!(
        h.gateway.get_call_id_list_for_conference(third).await.unwrap(),
        vec![second, first, third]
    );
    for call_id in [first, second, third] {
        assert_eq!(h.gateway.get_call(call_id).await.unwrap().state, CallState::Active);
    }
}

#[tokio::test]
async fn test_join_respects_size_limit() {
    let h = harness_with(fast_config().with_max_conference_size(2), |radio| radio);
    let (first, second) = two_calls(&h).await;
    h.gateway.combine_conference(second).await.unwrap();
    let third = answer_incoming(&h, "13800000000").await;

    let err = h.gateway.join_conference(second, &[third]).await.unwrap_err();
    assert!(err.is_invalid_state());
    assert_eq!(conference_state(&h, third).await, ConferenceState::Idle);
    assert_eq!(h.gateway.get_sub_call_id_list(second).await.unwrap(), vec![first]);
}

#[tokio::test]
async fn test_separate_dissolves_two_party_conference() {
    let h = harness();
    let (first, second) = two_calls(&h).await;
    h.gateway.combine_conference(second).await.unwrap();

    h.gateway.separate_conference(first).await.unwrap();

    let separated = h.gateway.get_call(first).await.unwrap();
    assert_eq!(separated.state, CallState::Active);
    assert_eq!(separated.conference_state, ConferenceState::Idle);
    assert_eq!(separated.main_call_id, None);

    let rest = h.gateway.get_call(second).await.unwrap();
    assert_eq!(rest.state, CallState::Holding);
    assert_eq!(rest.conference_state, ConferenceState::Idle);
}

#[tokio::test]
async fn test_separate_needs_a_conference() {
    let h = harness();
    let only = connected_call(&h, "10086").await;
    assert!(h.gateway.separate_conference(only).await.unwrap_err().is_invalid_state());
    assert!(h.gateway.kick_out_from_conference(only).await.unwrap_err().is_invalid_state());
}

#[tokio::test]
async fn test_kick_out_main_elects_new_main() {
    let h = harness();
    let (first, second) = two_calls(&h).await;
    h.gateway.combine_conference(second).await.unwrap();
    let third = answer_incoming(&h, "13800000000").await;
    h.gateway.join_conference(second, &[third]).await.unwrap();

    h.gateway.kick_out_from_conference(second).await.unwrap();
    wait_until_gone(&h.gateway, second).await;

    assert_eq!(h.gateway.get_main_call_id(third).await.unwrap(), Some(first));
    assert_eq!(
        h.gateway.get_call_id_list_for_conference(third).await.unwrap(),
        vec![first, third]
    );

    // Down to one member: the conference dissolves
    h.gateway.kick_out_from_conference(third).await.unwrap();
    wait_until_gone(&h.gateway, third).await;
    let last = h.gateway.get_call(first).await.unwrap();
    assert_eq!(last.state, CallState::Active);
    assert_eq!(last.conference_state, ConferenceState::Idle);
    assert_eq!(last.main_call_id, None);
}

#[tokio::test]
async fn test_member_release_rebalances_conference() {
    let h = harness();
    let (first, second) = two_calls(&h).await;
    h.gateway.combine_conference(second).await.unwrap();

    h.gateway.hang_up_call(first).await.unwrap();
    wait_until_gone(&h.gateway, first).await;

    let rest = h.gateway.get_call(second).await.unwrap();
    assert_eq!(rest.conference_state, ConferenceState::Idle);
    assert_eq!(rest.main_call_id, None);
    assert_eq!(rest.state, CallState::Active);
}
