//! DTMF, audio routing and IMS video control

mod common;

use pretty_assertions::assert_eq;

use common::*;
use telcall_core::events::{CallSessionEventId, VideoRequestResult};
use telcall_core::services::audio::{AudioDevice, AudioDeviceType};
use telcall_core::{
    CallEvent, CallId, CallRecord, CallState, CallType, DialCallOptions, EventKind, EventSubscriber, ImsCallMode,
    IncomingCallInfo, RadioSignal, SignalEvent, VideoState,
};

async fn video_call(h: &Harness) -> CallId {
    let options = DialCallOptions::new().with_video_state(VideoState::VideoBidirectional);
    let call_id = h.gateway.dial_call("10086", options).await.unwrap().call_id().unwrap();
    h.radio.network_accepted(call_id);
    h.radio.remote_answered(call_id);
    let record = wait_for_state(&h.gateway, call_id, CallState::Active).await;
    assert_eq!(record.call_type, CallType::Ims);
    call_id
}

// ===== DTMF =====

#[tokio::test]
async fn test_dtmf_on_active_call() {
    let h = harness();
    let call_id = connected_call(&h, "10086").await;

    assert!(h.gateway.start_dtmf(call_id, 'E').await.unwrap_err().is_invalid_argument());

    h.gateway.start_dtmf(call_id, '5').await.unwrap();
    assert_eq!(h.gateway.get_call(call_id).await.unwrap().dtmf_active, Some('5'));
    h.gateway.stop_dtmf(call_id).await.unwrap();
    assert_eq!(h.gateway.get_call(call_id).await.unwrap().dtmf_active, None);

    h.gateway.hold_call(call_id).await.unwrap();
    assert!(h.gateway.start_dtmf(call_id, '5').await.unwrap_err().is_invalid_state());
    assert!(h.gateway.start_dtmf(CallId(42), '5').await.unwrap_err().is_invalid_argument());
}

// ===== Audio =====

#[tokio::test]
async fn test_audio_route_follows_devices() {
    let h = harness();
    let mut changes = h.gateway.subscribe_channel(&[EventKind::AudioDeviceChange]);
    assert_eq!(
        h.gateway.get_audio_device().current_audio_device.device_type,
        AudioDeviceType::Earpiece
    );

    h.gateway
        .set_audio_device(&AudioDevice::builtin(AudioDeviceType::Speaker))
        .await
        .unwrap();
    match changes.recv().await.unwrap() {
        CallEvent::AudioDeviceChange(info) => {
            assert_eq!(info.current_audio_device.device_type, AudioDeviceType::Speaker)
        }
        other => panic!("unexpected event {:?}", other),
    }

    let headset = AudioDevice::bluetooth("00:11:22:33:44:55", "Headset");
    assert!(h.gateway.set_audio_device(&headset).await.unwrap_err().is_invalid_argument());

    h.radio.inject(RadioSignal::AudioDeviceConnected(headset.clone()));
    changes.recv().await.unwrap();
    assert_eq!(h.gateway.get_audio_device().current_audio_device, headset);

    h.radio.inject(RadioSignal::AudioDeviceDisconnected(headset));
    changes.recv().await.unwrap();
    assert_eq!(
        h.gateway.get_audio_device().current_audio_device.device_type,
        AudioDeviceType::Earpiece
    );
}

#[tokio::test]
async fn test_mute_needs_a_call_and_resets_when_idle() {
    let h = harness();
    assert!(h.gateway.set_muted().await.unwrap_err().is_invalid_state());

    let call_id = connected_call(&h, "10086").await;
    h.gateway.set_muted().await.unwrap();
    assert!(h.gateway.get_audio_device().is_muted);

    let mut changes = h.gateway.subscribe_channel(&[EventKind::AudioDeviceChange]);
    h.gateway.hang_up_call(call_id).await.unwrap();
    let events = collect_until(&mut changes, |e| {
        matches!(e, CallEvent::AudioDeviceChange(info) if !info.is_muted)
    })
    .await;
    assert_eq!(events.len(), 1);
    assert!(!h.gateway.get_audio_device().is_muted);
}

#[tokio::test]
async fn test_mute_ringer_needs_ringing_call() {
    let h = harness();
    assert!(h.gateway.mute_ringer().await.unwrap_err().is_invalid_state());

    h.gateway
        .handle_incoming_call(IncomingCallInfo::new("13800000000", 0))
        .await
        .unwrap();
    h.gateway.mute_ringer().await.unwrap();
}

// ===== Video =====

#[tokio::test]
async fn test_video_controls_need_ims_call() {
    let h = harness();
    let call_id = connected_call(&h, "10086").await;

    let err = h.gateway.control_camera(call_id, "0").await.unwrap_err();
    assert_eq!(err.category(), "unsupported");
    let err = h
        .gateway
        .update_ims_call_mode(call_id, ImsCallMode::SendReceive)
        .await
        .unwrap_err();
    assert_eq!(err.category(), "unsupported");
    assert!(!h.radio.ops().contains(&"control_camera"));
}

#[tokio::test]
async fn test_camera_lifecycle() {
    let h = harness();
    let mut session = h.gateway.subscribe_channel(&[EventKind::CallSessionEvent]);
    let mut capabilities = h.gateway.subscribe_channel(&[EventKind::CameraCapabilitiesChange]);
    let call_id = video_call(&h).await;

    assert!(h.gateway.set_camera_zoom(2.0).await.unwrap_err().is_invalid_state());

    h.gateway.control_camera(call_id, "0").await.unwrap();
    assert_eq!(
        session.recv().await.unwrap(),
        CallEvent::CallSessionEvent {
            call_id,
            event_id: CallSessionEventId::CameraReady,
        }
    );
    assert_eq!(
        capabilities.recv().await.unwrap(),
        CallEvent::CameraCapabilitiesChange {
            call_id,
            width: 640,
            height: 480,
        }
    );

    h.gateway.set_preview_surface(call_id, "surface-1").await.unwrap();
    h.gateway.set_device_direction(call_id, 90).await.unwrap();
    assert!(h.gateway.set_device_direction(call_id, 45).await.unwrap_err().is_invalid_argument());
    assert!(h.gateway.set_camera_zoom(20.0).await.unwrap_err().is_invalid_argument());
    h.gateway.set_camera_zoom(2.0).await.unwrap();

    let record = h.gateway.get_call(call_id).await.unwrap();
    assert_eq!(record.video.camera_id.as_deref(), Some("0"));
    assert_eq!(record.video.preview_surface.as_deref(), Some("surface-1"));
    assert_eq!(record.video.device_direction, 90);
    assert_eq!(record.video.zoom_ratio, 2.0);

    h.gateway.control_camera(call_id, "").await.unwrap();
    assert_eq!(h.gateway.get_call(call_id).await.unwrap().video.camera_id, None);
}

/// Wait for a `callDetailsChange` of `call_id` whose record satisfies `matches`
async fn next_change(details: &mut EventSubscriber, call_id: CallId, matches: impl Fn(&CallRecord) -> bool) {
    collect_until(details, |event| {
        matches!(event, CallEvent::CallDetailsChange(record) if record.call_id == call_id && matches(record))
    })
    .await;
}

#[tokio::test]
async fn test_every_attribute_change_is_published() {
    let h = harness();
    let call_id = video_call(&h).await;
    let mut details = h.gateway.subscribe_channel(&[EventKind::CallDetailsChange]);

    h.gateway.control_camera(call_id, "0").await.unwrap();
    next_change(&mut details, call_id, |r| r.video.camera_id.as_deref() == Some("0")).await;

    h.gateway.set_device_direction(call_id, 180).await.unwrap();
    next_change(&mut details, call_id, |r| r.video.device_direction == 180).await;

    h.gateway.set_camera_zoom(4.0).await.unwrap();
    next_change(&mut details, call_id, |r| r.video.zoom_ratio == 4.0).await;

    h.gateway.set_preview_surface(call_id, "surface-1").await.unwrap();
    next_change(&mut details, call_id, |r| r.video.preview_surface.is_some()).await;

    h.radio.inject(RadioSignal::call(
        call_id,
        SignalEvent::Session(CallSessionEventId::ReleasePreviewSurface),
    ));
    next_change(&mut details, call_id, |r| r.video.preview_surface.is_none()).await;

    h.gateway.start_dtmf(call_id, '5').await.unwrap();
    next_change(&mut details, call_id, |r| r.dtmf_active == Some('5')).await;

    h.gateway.stop_dtmf(call_id).await.unwrap();
    next_change(&mut details, call_id, |r| r.dtmf_active.is_none()).await;
}

#[tokio::test]
async fn test_ims_mode_change_updates_video_state() {
    let h = harness();
    let mut modes = h.gateway.subscribe_channel(&[EventKind::ImsCallModeChange]);
    let call_id = video_call(&h).await;

    h.gateway
        .update_ims_call_mode(call_id, ImsCallMode::AudioOnly)
        .await
        .unwrap();
    match modes.recv().await.unwrap() {
        CallEvent::ImsCallModeChange(info) => {
            assert_eq!(info.call_id, call_id);
            assert_eq!(info.mode, ImsCallMode::AudioOnly);
            assert_eq!(info.result, VideoRequestResult::Success);
        }
        other => panic!("unexpected event {:?}", other),
    }

    let record = h.gateway.get_call(call_id).await.unwrap();
    assert_eq!(record.ims_call_mode, ImsCallMode::AudioOnly);
    assert_eq!(record.video_state, VideoState::Voice);
}

#[tokio::test]
async fn test_peer_dimensions_for_unknown_call() {
    let h = harness();
    let err = h
        .gateway
        .handle_signal(
            CallId(7),
            SignalEvent::PeerDimensions {
                width: 1280,
                height: 720,
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_invalid_argument());
}
