//! Supplementary services, IMS switches and permission checks

mod common;

use pretty_assertions::assert_eq;
use std::sync::Arc;

use common::*;
use telcall_core::adapters::ability::{CONTACTS_BUNDLE_NAME, PAGE_FLAG_EDIT_BEFORE_CALLING};
use telcall_core::services::supplementary::{
    CallRestrictionInfo, CallRestrictionMode, CallRestrictionType, CallTransferInfo, CallTransferSettingType,
    CallTransferType, CallWaitingStatus, RestrictionStatus, TransferStatus, VoNrState,
};
use telcall_core::{
    CallGateway, CallId, DialCallOptions, LoopbackRadio, MakeCallOutcome, Permission, PermissionSet,
    RecordingAbilityHost,
};

fn restriction(password: &str, mode: CallRestrictionMode) -> CallRestrictionInfo {
    CallRestrictionInfo {
        restriction_type: CallRestrictionType::AllOutgoing,
        password: password.to_string(),
        mode,
    }
}

#[tokio::test]
async fn test_call_waiting_round_trip() {
    let h = harness();
    assert_eq!(h.gateway.get_call_waiting(0).await.unwrap(), CallWaitingStatus::Enabled);
    h.gateway.set_call_waiting(0, false).await.unwrap();
    assert_eq!(h.gateway.get_call_waiting(0).await.unwrap(), CallWaitingStatus::Disabled);
    // Slots are independent
    assert_eq!(h.gateway.get_call_waiting(1).await.unwrap(), CallWaitingStatus::Enabled);
    assert!(h.gateway.get_call_waiting(2).await.unwrap_err().is_invalid_argument());
}

#[tokio::test]
async fn test_call_restriction_and_password() {
    let h = harness();
    let kind = CallRestrictionType::AllOutgoing;

    let err = h
        .gateway
        .set_call_restriction(0, &restriction("12a4", CallRestrictionMode::Activation))
        .await
        .unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(h.radio.ops().is_empty());

    let err = h
        .gateway
        .set_call_restriction(0, &restriction("1234", CallRestrictionMode::Activation))
        .await
        .unwrap_err();
    assert!(err.is_invalid_argument());

    h.gateway
        .set_call_restriction(0, &restriction("0000", CallRestrictionMode::Activation))
        .await
        .unwrap();
    assert_eq!(
        h.gateway.get_call_restriction(0, kind).await.unwrap(),
        RestrictionStatus::Activated
    );

    assert!(h
        .gateway
        .set_call_restriction_password(0, kind, "0000", "0000")
        .await
        .unwrap_err()
        .is_invalid_argument());
    h.gateway
        .set_call_restriction_password(0, kind, "0000", "4321")
        .await
        .unwrap();

    h.gateway
        .set_call_restriction(0, &restriction("4321", CallRestrictionMode::Deactivation))
        .await
        .unwrap();
    assert_eq!(
        h.gateway.get_call_restriction(0, kind).await.unwrap(),
        RestrictionStatus::NotRegistered
    );
}

#[tokio::test]
async fn test_call_transfer_settings() {
    let h = harness();
    let kind = CallTransferType::Busy;

    let bad = CallTransferInfo {
        transfer_num: "call me".to_string(),
        setting_type: CallTransferSettingType::Registration,
        transfer_type: kind,
    };
    assert!(h.gateway.set_call_transfer_info(0, &bad).await.unwrap_err().is_invalid_argument());

    let register = CallTransferInfo {
        transfer_num: "13800000000".to_string(),
        setting_type: CallTransferSettingType::Registration,
        transfer_type: kind,
    };
    h.gateway.set_call_transfer_info(0, &register).await.unwrap();
    let result = h.gateway.get_call_transfer_info(0, kind).await.unwrap();
    assert_eq!(result.status, TransferStatus::Enabled);
    assert_eq!(result.number, "13800000000");

    let erase = CallTransferInfo {
        transfer_num: String::new(),
        setting_type: CallTransferSettingType::Erasure,
        transfer_type: kind,
    };
    h.gateway.set_call_transfer_info(0, &erase).await.unwrap();
    assert_eq!(
        h.gateway.get_call_transfer_info(0, kind).await.unwrap().status,
        TransferStatus::Disabled
    );
}

#[tokio::test]
async fn test_ims_switch_and_vonr() {
    let h = harness();
    assert!(h.gateway.is_ims_switch_enabled(0).await.unwrap());
    h.gateway.disable_ims_switch(0).await.unwrap();
    assert!(!h.gateway.is_ims_switch_enabled(0).await.unwrap());
    h.gateway.enable_ims_switch(0).await.unwrap();
    assert!(h.gateway.is_ims_switch_enabled(0).await.unwrap());

    assert_eq!(h.gateway.get_vonr_state(1).await.unwrap(), VoNrState::Off);
    h.gateway.set_vonr_state(1, VoNrState::On).await.unwrap();
    assert_eq!(h.gateway.get_vonr_state(1).await.unwrap(), VoNrState::On);
}

#[tokio::test]
async fn test_offline_radio_is_service_unavailable() {
    let h = harness();
    h.radio.set_online(false);
    let err = h.gateway.get_call_waiting(0).await.unwrap_err();
    assert_eq!(err.category(), "service_unavailable");
    let err = h.gateway.dial_call("10086", DialCallOptions::new()).await.unwrap_err();
    assert_eq!(err.category(), "service_unavailable");
}

// ===== Permissions =====

fn gateway_with(permissions: PermissionSet) -> (CallGateway, Arc<LoopbackRadio>) {
    let (radio, signals) = LoopbackRadio::new();
    let radio = Arc::new(radio);
    let gateway = CallGateway::new(fast_config(), radio.clone())
        .unwrap()
        .with_permissions(permissions);
    gateway.attach_signals(signals);
    (gateway, radio)
}

#[tokio::test]
async fn test_permission_checked_before_arguments() {
    let (gateway, radio) = gateway_with(PermissionSet::none());

    let err = gateway.dial_call("not a number", DialCallOptions::new()).await.unwrap_err();
    assert_eq!(err.category(), "permission_denied");
    let err = gateway.hang_up_call(CallId(99)).await.unwrap_err();
    assert_eq!(err.category(), "permission_denied");
    let err = gateway.combine_calls(CallId(1), &[CallId(2)]).await.unwrap_err();
    assert_eq!(err.category(), "permission_denied");
    let err = gateway.get_call_waiting(9).await.unwrap_err();
    assert_eq!(err.category(), "permission_denied");
    assert_eq!(gateway.is_ringing().await.unwrap_err().category(), "permission_denied");
    assert!(radio.ops().is_empty());
}

#[tokio::test]
async fn test_read_only_caller() {
    let (gateway, _radio) = gateway_with(PermissionSet::none().with(Permission::GetTelephonyState));

    assert_eq!(gateway.get_call_waiting(0).await.unwrap(), CallWaitingStatus::Enabled);
    let err = gateway.set_call_waiting(0, false).await.unwrap_err();
    assert_eq!(err.category(), "permission_denied");
}

#[tokio::test]
async fn test_place_call_without_answer_permission() {
    let (gateway, _radio) = gateway_with(PermissionSet::all().without(Permission::AnswerCall));

    let call_id = gateway
        .dial_call("10086", DialCallOptions::new())
        .await
        .unwrap()
        .call_id()
        .unwrap();
    let err = gateway.hang_up_call(call_id).await.unwrap_err();
    assert_eq!(err.category(), "permission_denied");
}

// ===== Emergency numbers and the dialer =====

#[tokio::test]
async fn test_emergency_number_lookup() {
    let h = harness();
    assert!(h.gateway.is_emergency_phone_number("112", 0).unwrap());
    assert!(h.gateway.is_emergency_phone_number("1-1-2", 0).unwrap());
    assert!(!h.gateway.is_emergency_phone_number("10086", 0).unwrap());
    assert!(!h.gateway.is_emergency_phone_number("112,1", 0).unwrap());
    assert!(h.gateway.is_emergency_phone_number("112", 5).unwrap_err().is_invalid_argument());
    assert!(h.gateway.is_emergency_phone_number("", 0).unwrap_err().is_invalid_argument());
}

#[tokio::test]
async fn test_make_call_opens_dialer() {
    let host = Arc::new(RecordingAbilityHost::new());
    let (radio, _signals) = LoopbackRadio::new();
    let gateway = CallGateway::new(fast_config(), Arc::new(radio))
        .unwrap()
        .with_ability_host(host.clone());

    assert_eq!(gateway.make_call("10086").await.unwrap(), MakeCallOutcome::AbilityStarted);

    let requests = host.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].bundle_name, CONTACTS_BUNDLE_NAME);
    assert_eq!(requests[0].parameters.get("phoneNumber").map(String::as_str), Some("10086"));
    assert_eq!(
        requests[0].parameters.get("pageFlag").map(String::as_str),
        Some(PAGE_FLAG_EDIT_BEFORE_CALLING)
    );
    assert!(!gateway.has_call().await);
}

#[tokio::test]
async fn test_make_call_hands_raw_number_to_dialer() {
    let host = Arc::new(RecordingAbilityHost::new());
    let (radio, _signals) = LoopbackRadio::new();
    let gateway = CallGateway::new(fast_config(), Arc::new(radio))
        .unwrap()
        .with_ability_host(host.clone());

    // The dialer lets the user fix the number, so nothing is rejected here
    for number in ["", "not a number"] {
        assert_eq!(gateway.make_call(number).await.unwrap(), MakeCallOutcome::AbilityStarted);
    }
    let numbers: Vec<String> = host
        .requests()
        .into_iter()
        .filter_map(|r| r.parameters.get("phoneNumber").cloned())
        .collect();
    assert_eq!(numbers, vec!["".to_string(), "not a number".to_string()]);
}

#[tokio::test]
async fn test_make_call_without_dialer_validates_number() {
    let h = harness();
    assert!(h.gateway.make_call("").await.unwrap_err().is_invalid_argument());
    assert!(h.gateway.list_calls().await.is_empty());
}

#[tokio::test]
async fn test_make_call_without_dialer_dials() {
    let h = harness();
    match h.gateway.make_call("10086").await.unwrap() {
        MakeCallOutcome::Dialed(outcome) => assert!(outcome.call_id().is_some()),
        other => panic!("unexpected outcome {:?}", other),
    }
}
