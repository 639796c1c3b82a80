mod common;

use common::*;
use netshare::scripted::{HostCall, MirrorCall, ScriptedScan};
use netshare::{
    AutomationConfig, DetectedCode, FailureReason, GatewayEvent, MirrorError, ScanError,
    ScreenSignal,
};
use std::time::Duration;
use tokio::time::sleep;

fn failure(reason: FailureReason) -> GatewayEvent {
    GatewayEvent::Failure { reason }
}

fn parsed(ssid: &str, password: &str) -> GatewayEvent {
    GatewayEvent::QrParsed {
        ssid: ssid.into(),
        password: password.into(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_capture_delivers_payload() {
    let mut h = spawn_navigation_only();
    h.mirror.push_frame(Ok(frame()));
    h.scanner
        .push_codes(vec![DetectedCode::raw("WIFI:S:MyNet;T:WPA;P:pass123;;")]);

    h.gateway.capture_once().await;
    assert_eq!(next_event(&mut h.events).await, parsed("MyNet", "pass123"));

    assert_eq!(
        h.mirror.calls(),
        vec![
            MirrorCall::OpenStream,
            MirrorCall::StopStream,
            MirrorCall::Release
        ]
    );
    assert_eq!(h.host.calls(), vec![HostCall::BringToForeground]);
    assert!(!h.gateway.status().await.unwrap().capturing);
}

#[tokio::test(start_paused = true)]
async fn test_structured_wifi_code_preferred() {
    let mut h = spawn_navigation_only();
    h.mirror.push_frame(Ok(frame()));
    h.scanner.push_codes(vec![
        DetectedCode::raw("https://example.com"),
        DetectedCode::wifi("Typed", "typed-secret"),
    ]);

    h.gateway.capture_once().await;
    assert_eq!(next_event(&mut h.events).await, parsed("Typed", "typed-secret"));
}

#[tokio::test(start_paused = true)]
async fn test_retry_once_then_succeed() {
    let mut h = spawn_navigation_only();
    h.mirror.push_frame(Ok(frame()));
    h.mirror.push_frame(Ok(frame()));
    h.scanner.push_codes(vec![]);
    h.scanner
        .push_codes(vec![DetectedCode::raw("WIFI:P:abc;S:Cafe;;")]);

    h.gateway.capture_once().await;
    assert_eq!(next_event(&mut h.events).await, parsed("Cafe", "abc"));
    assert_eq!(h.scanner.scans(), 2);
    assert_eq!(h.mirror.streams_opened(), 2);
    assert_eq!(h.host.calls(), vec![HostCall::BringToForeground]);
}

#[tokio::test(start_paused = true)]
async fn test_second_miss_is_timeout() {
    let mut h = spawn_navigation_only();
    h.mirror.push_frame(Ok(frame()));
    h.mirror.push_frame(Ok(frame()));
    h.mirror.push_frame(Ok(frame()));
    h.scanner.push_codes(vec![DetectedCode::raw("hello")]);
    h.scanner.push_codes(vec![]);

    h.gateway.capture_once().await;
    assert_eq!(
        next_event(&mut h.events).await,
        failure(FailureReason::Timeout)
    );

    // No third attempt follows
    sleep(Duration::from_secs(5)).await;
    assert_eq!(h.scanner.scans(), 2);
    assert!(drain(&mut h.events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_blocked_capture_is_not_retried() {
    let mut h = spawn_navigation_only();
    h.mirror.push_frame(Err(MirrorError::Blocked));

    h.gateway.capture_once().await;
    assert_eq!(next_event(&mut h.events).await, GatewayEvent::CaptureBlocked);
    sleep(Duration::from_secs(5)).await;
    assert_eq!(h.mirror.streams_opened(), 1);
    assert_eq!(h.scanner.scans(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_capture_without_permission() {
    let mut h = spawn_navigation_only();
    h.mirror.set_ready(false);

    h.gateway.capture_once().await;
    assert_eq!(
        next_event(&mut h.events).await,
        failure(FailureReason::PermissionDenied)
    );
    assert_eq!(h.mirror.streams_opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_stream_times_out() {
    let mut h = spawn_navigation_only();
    let started = tokio::time::Instant::now();

    h.gateway.capture_once().await;
    assert_eq!(
        next_event(&mut h.events).await,
        failure(FailureReason::Timeout)
    );
    assert!(started.elapsed() >= Duration::from_millis(2_000));
    assert_eq!(h.scanner.scans(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_decoder_error_is_decode_failed() {
    let mut h = spawn_navigation_only();
    h.mirror.push_frame(Ok(frame()));
    h.scanner
        .push(ScriptedScan::Error(ScanError::Decoder("model unavailable".into())));

    h.gateway.capture_once().await;
    assert_eq!(
        next_event(&mut h.events).await,
        failure(FailureReason::DecodeFailed)
    );
}

#[tokio::test(start_paused = true)]
async fn test_scanner_crash_is_capture_error() {
    let mut h = spawn_navigation_only();
    h.mirror.push_frame(Ok(frame()));
    h.scanner.push(ScriptedScan::Panic);

    h.gateway.capture_once().await;
    assert_eq!(
        next_event(&mut h.events).await,
        failure(FailureReason::CaptureError)
    );
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_capture_is_ignored() {
    let mut h = spawn(AutomationConfig {
        frame_timeout_ms: 60_000,
        capture_on_qr_visible: false,
        ..AutomationConfig::default()
    });

    h.gateway.capture_once().await;
    h.gateway.capture_once().await;
    assert!(!h.gateway.capture_from_prewarm().await.unwrap());
    assert!(h.gateway.status().await.unwrap().capturing);
    assert_eq!(h.mirror.streams_opened(), 1);

    // The single in-flight attempt still ends exactly once
    assert_eq!(
        next_event(&mut h.events).await,
        failure(FailureReason::Timeout)
    );
}

#[tokio::test(start_paused = true)]
async fn test_reset_drops_pending_retry() {
    let mut h = spawn_navigation_only();
    h.mirror.push_frame(Ok(frame()));
    h.mirror.push_frame(Ok(frame()));
    h.scanner.push_codes(vec![]);
    h.scanner
        .push_codes(vec![DetectedCode::raw("WIFI:S:Late;P:x;;")]);

    h.gateway.capture_once().await;
    // First scan came back empty, retry is due 300ms later
    sleep(Duration::from_millis(100)).await;
    assert_eq!(h.scanner.scans(), 1);

    h.gateway.reset_connectivity_session_flags().await;
    sleep(Duration::from_secs(2)).await;

    assert_eq!(h.scanner.scans(), 1);
    assert_eq!(h.mirror.streams_opened(), 1);
    assert!(drain(&mut h.events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_prewarm_capture() {
    let mut h = spawn_navigation_only();
    h.gateway.prewarm_start().await;
    h.mirror.set_prewarm_frame(Some(frame()));
    h.scanner
        .push_codes(vec![DetectedCode::raw("WIFI:S:Warm;P:up;;")]);

    assert!(h.gateway.capture_from_prewarm().await.unwrap());
    assert_eq!(next_event(&mut h.events).await, parsed("Warm", "up"));

    let calls = h.mirror.calls();
    assert_eq!(
        calls,
        vec![
            MirrorCall::StartPrewarm,
            MirrorCall::StopStream,
            MirrorCall::StopPrewarm,
            MirrorCall::Release
        ]
    );
    assert_eq!(h.mirror.streams_opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_prewarm_without_frame_is_no_frame() {
    let mut h = spawn_navigation_only();
    h.gateway.prewarm_start().await;

    assert!(!h.gateway.capture_from_prewarm().await.unwrap());
    assert_eq!(
        next_event(&mut h.events).await,
        failure(FailureReason::NoFrame)
    );
    sleep(Duration::from_secs(2)).await;
    assert_eq!(h.scanner.scans(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_prewarm_needs_permission() {
    let h = spawn_navigation_only();
    h.mirror.set_ready(false);
    h.gateway.prewarm_start().await;
    h.gateway.status().await.unwrap();
    assert!(h.mirror.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_qr_screen_triggers_capture() {
    let mut h = spawn(AutomationConfig::default());
    h.ui.set_screen(qr_screen());
    h.mirror.push_frame(Ok(frame()));
    h.scanner
        .push_codes(vec![DetectedCode::raw("WIFI:S:HomeNet;T:WPA;P:hunter22;;")]);

    h.gateway.start_session().await;
    h.gateway
        .screen_signal(ScreenSignal::content_changed(SETTINGS))
        .await;

    assert_eq!(next_event(&mut h.events).await, GatewayEvent::QrVisible);
    assert_eq!(next_event(&mut h.events).await, parsed("HomeNet", "hunter22"));
}

#[tokio::test(start_paused = true)]
async fn test_qr_screen_uses_running_prewarm() {
    let mut h = spawn(AutomationConfig::default());
    h.gateway.prewarm_start().await;
    h.mirror.set_prewarm_frame(Some(frame()));
    h.scanner
        .push_codes(vec![DetectedCode::wifi("HomeNet", "hunter22")]);

    h.gateway.start_session().await;
    h.gateway
        .screen_signal(ScreenSignal::content_changed(SETTINGS))
        .await;
    assert_eq!(next_event(&mut h.events).await, GatewayEvent::SettingsListVisible);

    h.ui.set_screen(qr_screen());
    h.gateway
        .screen_signal(ScreenSignal::content_changed(SETTINGS))
        .await;
    assert_eq!(next_event(&mut h.events).await, GatewayEvent::QrVisible);
    assert_eq!(next_event(&mut h.events).await, parsed("HomeNet", "hunter22"));
    assert_eq!(h.mirror.streams_opened(), 0);
}
