//! Scanner controller lifecycle against a fake camera and approver.

#![cfg(feature = "testing")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use atelier_client::errors::ApiError;
use atelier_client::notifications::{NotificationLevel, Notifier};
use atelier_client::scanner::{
    ScannerController, ScannerError, ScannerEvent, ScannerState,
};
use atelier_client::session::SessionStore;
use atelier_client::testing::{FakeCamera, ScriptedApprover};
use atelier_config::ScannerConfig;
use atelier_model::{ScanApproval, SessionTokens};
use tokio::sync::broadcast;

use common::{signed_in, wait_for};

struct Harness {
    controller: ScannerController,
    camera: FakeCamera,
    approver: Arc<ScriptedApprover>,
    notifier: Notifier,
    session: SessionStore,
}

fn harness_with(session: SessionStore) -> Harness {
    let camera = FakeCamera::new(&ScannerConfig::default().surface_id);
    harness_from(session, camera, ScriptedApprover::new())
}

/// Camera steps and approvals that take `latency` each.
fn slow_harness(latency: Duration) -> Harness {
    let camera = FakeCamera::new(&ScannerConfig::default().surface_id).with_latency(latency);
    harness_from(
        signed_in("access", Some("refresh")),
        camera,
        ScriptedApprover::new().with_delay(latency),
    )
}

fn harness_from(session: SessionStore, camera: FakeCamera, approver: ScriptedApprover) -> Harness {
    let config = ScannerConfig::default();
    let approver = Arc::new(approver);
    let notifier = Notifier::new();
    let controller = ScannerController::spawn(
        config,
        Arc::new(camera.clone()),
        approver.clone(),
        session.clone(),
        notifier.clone(),
    );
    Harness {
        controller,
        camera,
        approver,
        notifier,
        session,
    }
}

fn harness() -> Harness {
    harness_with(signed_in("access", Some("refresh")))
}

fn drain(events: &mut broadcast::Receiver<ScannerEvent>) -> Vec<ScannerEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn json_payload_is_approved_with_its_token() {
    let h = harness();
    let mut rx = h.controller.subscribe();
    let mut notes = h.notifier.subscribe();

    h.controller.start().await.unwrap();
    assert!(h.camera.emit(r#"{"qrToken":"abc123"}"#).await);

    let done = wait_for(&mut rx, |s| s.completed).await;
    assert_eq!(h.approver.tokens(), vec!["abc123".to_string()]);
    assert_eq!(done.state, ScannerState::Idle);
    assert_eq!(done.redirect.as_deref(), Some("/"));
    assert_eq!(h.camera.live_decoders(), 0);
    assert_eq!(h.camera.surface().live_tracks(), 0);

    let note = notes.recv().await.unwrap();
    assert_eq!(note.level, NotificationLevel::Success);
}

#[tokio::test(start_paused = true)]
async fn url_payload_is_approved_with_path_token() {
    let h = harness();
    let mut rx = h.controller.subscribe();

    h.controller.start().await.unwrap();
    h.camera.emit("https://host/v/xyz789").await;

    wait_for(&mut rx, |s| s.completed).await;
    assert_eq!(h.approver.tokens(), vec!["xyz789".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn redirect_prefers_server_then_payload() {
    let h = harness();
    let mut rx = h.controller.subscribe();
    h.approver
        .push(Ok(ScanApproval::approved(Some("/studio".into()))));

    h.controller.start().await.unwrap();
    h.camera
        .emit(r#"{"qrToken":"t1","redirect":"/from-code"}"#)
        .await;
    let done = wait_for(&mut rx, |s| s.completed).await;
    assert_eq!(done.redirect.as_deref(), Some("/studio"));

    h.controller.start().await.unwrap();
    h.camera
        .emit(r#"{"qrToken":"t2","redirect":"/from-code"}"#)
        .await;
    let done = wait_for(&mut rx, |s| s.completed).await;
    assert_eq!(done.redirect.as_deref(), Some("/from-code"));
}

#[tokio::test(start_paused = true)]
async fn unrecognized_payload_is_reported_and_scanning_continues() {
    let h = harness();
    let mut rx = h.controller.subscribe();

    h.controller.start().await.unwrap();
    h.camera.emit("not-json-or-url").await;

    let snapshot = wait_for(&mut rx, |s| s.failed_attempts == 1).await;
    assert_eq!(
        snapshot.last_error,
        Some(ScannerError::Unrecognized {
            raw: "not-json-or-url".to_string()
        })
    );
    assert_eq!(snapshot.state, ScannerState::Scanning);
    assert!(h.approver.tokens().is_empty());
}

#[tokio::test(start_paused = true)]
async fn five_failures_force_exactly_one_restart_before_attempt_six() {
    let h = harness();
    let mut rx = h.controller.subscribe();
    let mut events = h.controller.events();

    h.controller.start().await.unwrap();
    assert_eq!(h.camera.open_count(), 1);
    for attempt in 1..=5 {
        h.camera.emit(&format!("garbage-{attempt}")).await;
    }

    let snapshot = wait_for(&mut rx, |s| {
        s.forced_restarts == 1 && s.state == ScannerState::Scanning
    })
    .await;
    assert_eq!(snapshot.failed_attempts, 0);
    assert_eq!(h.camera.open_count(), 2);

    h.camera.emit("garbage-6").await;
    let snapshot = wait_for(&mut rx, |s| s.failed_attempts == 1).await;
    assert_eq!(snapshot.forced_restarts, 1);
    assert_eq!(h.camera.open_count(), 2);

    let forced: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, ScannerEvent::ForcedRestart { .. }))
        .collect();
    assert_eq!(forced, vec![ScannerEvent::ForcedRestart { attempts: 5 }]);
}

#[tokio::test(start_paused = true)]
async fn identical_unrecognized_payloads_are_counted_but_reported_once() {
    let h = harness();
    let mut rx = h.controller.subscribe();
    let mut events = h.controller.events();

    h.controller.start().await.unwrap();
    h.camera.emit("same-text").await;
    h.camera.emit("same-text").await;
    h.camera.emit("other-text").await;
    let snapshot = wait_for(&mut rx, |s| {
        matches!(&s.last_error, Some(ScannerError::Unrecognized { raw }) if raw == "other-text")
    })
    .await;
    assert_eq!(snapshot.failed_attempts, 3);
    let reported = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, ScannerEvent::Error(_)))
        .count();
    assert_eq!(reported, 2);

    tokio::time::sleep(Duration::from_secs(4)).await;
    h.camera.emit("other-text").await;
    let snapshot = wait_for(&mut rx, |s| s.failed_attempts == 4).await;
    assert_eq!(snapshot.state, ScannerState::Scanning);
    let reported = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, ScannerEvent::Error(_)))
        .count();
    assert_eq!(reported, 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_identical_garbage_still_forces_restart() {
    let h = harness();
    let mut rx = h.controller.subscribe();
    let mut notes = h.notifier.subscribe();

    h.controller.start().await.unwrap();
    for _ in 0..5 {
        h.camera.emit("same-garbage").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let snapshot = wait_for(&mut rx, |s| {
        s.forced_restarts == 1 && s.state == ScannerState::Scanning
    })
    .await;
    assert_eq!(snapshot.failed_attempts, 0);
    assert_eq!(h.camera.open_count(), 2);
    assert_eq!(h.camera.live_decoders(), 1);

    let mut errors = 0;
    while let Ok(note) = notes.try_recv() {
        if note.level == NotificationLevel::Error {
            errors += 1;
        }
    }
    assert_eq!(errors, 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_approval_restarts_once_after_delay() {
    let h = harness();
    let mut rx = h.controller.subscribe();
    let mut events = h.controller.events();
    h.approver.reject("Code expired");

    h.controller.start().await.unwrap();
    h.camera.emit(r#"{"qrToken":"old"}"#).await;

    let failed = wait_for(&mut rx, |s| {
        matches!(s.last_error, Some(ScannerError::ApprovalFailed { .. }))
    })
    .await;
    assert_eq!(
        failed.last_error,
        Some(ScannerError::ApprovalFailed {
            message: "Code expired".to_string()
        })
    );
    assert_eq!(h.camera.live_decoders(), 0);

    wait_for(&mut rx, |s| s.state == ScannerState::Scanning).await;
    assert_eq!(h.camera.open_count(), 2);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.camera.open_count(), 2);
    let scheduled = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, ScannerEvent::RetryScheduled { .. }))
        .count();
    assert_eq!(scheduled, 1);
}

#[tokio::test(start_paused = true)]
async fn close_supersedes_scheduled_restart() {
    let h = harness();
    let mut rx = h.controller.subscribe();
    h.approver.push(Err(ApiError::Validation("Unknown code".into())));

    h.controller.start().await.unwrap();
    h.camera.emit(r#"{"qrToken":"abc"}"#).await;
    wait_for(&mut rx, |s| s.last_error.is_some()).await;

    h.controller.close().await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(h.camera.open_count(), 1);
    assert_eq!(h.controller.snapshot().state, ScannerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn close_resolves_after_camera_release() {
    let h = harness();
    let mut events = h.controller.events();

    h.controller.start().await.unwrap();
    assert_eq!(h.camera.surface().live_tracks(), 1);

    h.controller.close().await.unwrap();

    assert_eq!(h.camera.live_decoders(), 0);
    assert_eq!(h.camera.surface().live_tracks(), 0);
    assert_eq!(h.camera.decoder_stop_count(), 1);
    assert_eq!(h.controller.snapshot().state, ScannerState::Idle);
    assert_eq!(drain(&mut events).last(), Some(&ScannerEvent::Closed));
}

#[tokio::test(start_paused = true)]
async fn teardown_twice_is_harmless() {
    let h = harness();
    h.controller.start().await.unwrap();

    h.controller.teardown().await.unwrap();
    h.controller.teardown().await.unwrap();

    assert_eq!(h.controller.snapshot().state, ScannerState::Idle);
    assert_eq!(h.camera.live_decoders(), 0);
    assert_eq!(h.camera.decoder_stop_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn teardown_swallows_step_failures() {
    let h = harness();
    h.camera.fail_decoder_stop(true);
    h.camera.fail_surface_detach(true);
    h.controller.start().await.unwrap();

    h.controller.teardown().await.unwrap();

    assert_eq!(h.controller.snapshot().state, ScannerState::Idle);
    assert_eq!(h.camera.live_decoders(), 0);
    assert_eq!(h.camera.surface().live_tracks(), 0);
    assert_eq!(h.camera.surface().detach_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn at_most_one_decoder_is_ever_live() {
    let h = harness();

    h.controller.start().await.unwrap();
    h.controller.start().await.unwrap();
    h.controller.retry().await.unwrap();
    h.controller.teardown().await.unwrap();
    h.controller.start().await.unwrap();
    h.controller.retry().await.unwrap();
    h.controller.close().await.unwrap();
    h.controller.start().await.unwrap();

    assert_eq!(h.camera.open_count(), 5);
    assert_eq!(h.camera.live_decoders(), 1);
    assert_eq!(h.camera.max_live_decoders(), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_retry_resets_attempts() {
    let h = harness();
    let mut rx = h.controller.subscribe();

    h.controller.start().await.unwrap();
    h.camera.emit("nope-1").await;
    h.camera.emit("nope-2").await;
    wait_for(&mut rx, |s| s.failed_attempts == 2).await;

    h.controller.retry().await.unwrap();
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.failed_attempts, 0);
    assert_eq!(snapshot.last_error, None);
    assert_eq!(snapshot.state, ScannerState::Scanning);
}

#[tokio::test(start_paused = true)]
async fn permission_denied_returns_to_idle() {
    let h = harness();
    h.camera.deny_permission(true);

    let err = h.controller.start().await.unwrap_err();

    assert_eq!(err, ScannerError::PermissionDenied);
    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.state, ScannerState::Idle);
    assert_eq!(snapshot.last_error, Some(ScannerError::PermissionDenied));
    assert_eq!(h.camera.probe_count(), 1);
    assert_eq!(h.camera.open_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn start_waits_for_session_when_signed_out() {
    let h = harness_with(SessionStore::new());
    let mut rx = h.controller.subscribe();

    let err = h.controller.start().await.unwrap_err();
    assert_eq!(err, ScannerError::NotAuthenticated);
    assert_eq!(h.camera.open_count(), 0);

    h.session.set(SessionTokens::new("late", None));
    wait_for(&mut rx, |s| s.state == ScannerState::Scanning).await;
    assert_eq!(h.camera.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn sign_out_releases_camera() {
    let h = harness();
    let mut rx = h.controller.subscribe();
    h.controller.start().await.unwrap();

    h.session.clear();

    wait_for(&mut rx, |s| s.state == ScannerState::Idle).await;
    assert_eq!(h.camera.live_decoders(), 0);
}

#[tokio::test(start_paused = true)]
async fn ended_stream_counts_as_failure_and_restarts() {
    let h = harness();
    let mut rx = h.controller.subscribe();
    h.controller.start().await.unwrap();

    h.camera.end_stream();

    let snapshot = wait_for(&mut rx, |s| s.failed_attempts == 1).await;
    assert!(matches!(snapshot.last_error, Some(ScannerError::Camera(_))));
    wait_for(&mut rx, |s| s.state == ScannerState::Scanning).await;
    assert_eq!(h.camera.open_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_tears_down() {
    let h = harness();
    h.controller.start().await.unwrap();
    let camera = h.camera.clone();
    drop(h);

    for _ in 0..100 {
        if camera.live_decoders() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(camera.live_decoders(), 0);
    assert_eq!(camera.surface().live_tracks(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_controller() {
    let h = harness();
    h.controller.start().await.unwrap();

    h.controller.shutdown().await.unwrap();

    assert_eq!(h.camera.live_decoders(), 0);
    assert_eq!(
        h.controller.start().await.unwrap_err(),
        ScannerError::ControllerStopped
    );
}

#[tokio::test(start_paused = true)]
async fn close_sent_with_start_tears_down_after_start_resolves() {
    let h = slow_harness(Duration::from_millis(200));

    let (started, closed) = tokio::join!(h.controller.start(), h.controller.close());
    started.unwrap();
    closed.unwrap();

    assert_eq!(h.camera.open_count(), 1);
    assert_eq!(h.camera.live_decoders(), 0);
    assert_eq!(h.camera.surface().live_tracks(), 0);
    assert_eq!(h.controller.snapshot().state, ScannerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn start_sent_with_teardown_waits_for_release() {
    let h = slow_harness(Duration::from_millis(200));
    h.controller.start().await.unwrap();

    let (torn, started) = tokio::join!(h.controller.teardown(), h.controller.start());
    torn.unwrap();
    started.unwrap();

    assert_eq!(h.camera.decoder_stop_count(), 1);
    assert_eq!(h.camera.open_count(), 2);
    assert_eq!(h.camera.live_decoders(), 1);
    assert_eq!(h.camera.max_live_decoders(), 1);
    assert_eq!(h.controller.snapshot().state, ScannerState::Scanning);
}

#[tokio::test(start_paused = true)]
async fn sign_out_during_approval_reports_failure() {
    let h = slow_harness(Duration::from_millis(500));
    let mut rx = h.controller.subscribe();

    h.controller.start().await.unwrap();
    h.camera.emit(r#"{"qrToken":"abc"}"#).await;
    wait_for(&mut rx, |s| s.state == ScannerState::Processing).await;

    h.session.clear();

    let snapshot = wait_for(&mut rx, |s| {
        s.state == ScannerState::Idle && s.last_error.is_some()
    })
    .await;
    assert_eq!(
        snapshot.last_error,
        Some(ScannerError::ApprovalFailed {
            message: "Your session has expired. Please sign in again.".to_string()
        })
    );
    assert_eq!(h.camera.live_decoders(), 0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    let snapshot = h.controller.snapshot();
    assert!(!snapshot.completed);
    assert_eq!(snapshot.state, ScannerState::Idle);
    assert_eq!(h.camera.open_count(), 1);
}
