#![allow(dead_code)]

use netshare::scripted::{ScriptedHost, ScriptedMirror, ScriptedScanner, ScriptedScreen, ScriptedUi};
use netshare::{AutomationConfig, Collaborators, Engine, Frame, GatewayEvent, SessionGateway};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub const SETTINGS: &str = "com.android.settings";

/// Give the engine time to settle a debounce window
pub const PAST_DEBOUNCE: Duration = Duration::from_millis(400);

pub struct Harness {
    pub gateway: SessionGateway,
    pub events: broadcast::Receiver<GatewayEvent>,
    pub ui: Arc<ScriptedUi>,
    pub mirror: Arc<ScriptedMirror>,
    pub scanner: Arc<ScriptedScanner>,
    pub host: Arc<ScriptedHost>,
    pub handle: JoinHandle<()>,
}

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn spawn(config: AutomationConfig) -> Harness {
    init_tracing();
    let ui = Arc::new(ScriptedUi::new(list_screen()));
    let mirror = Arc::new(ScriptedMirror::ready());
    let scanner = Arc::new(ScriptedScanner::default());
    let host = Arc::new(ScriptedHost::default());
    let collaborators = Collaborators {
        ui: ui.clone(),
        mirror: mirror.clone(),
        scanner: scanner.clone(),
        host: host.clone(),
    };
    let (gateway, handle) = Engine::spawn(config, collaborators).unwrap();
    let events = gateway.subscribe();
    Harness {
        gateway,
        events,
        ui,
        mirror,
        scanner,
        host,
        handle,
    }
}

/// Engine with defaults, except that detecting the QR screen does not capture
pub fn spawn_navigation_only() -> Harness {
    spawn(AutomationConfig {
        capture_on_qr_visible: false,
        ..AutomationConfig::default()
    })
}

pub fn list_screen() -> ScriptedScreen {
    ScriptedScreen::default()
        .with_text("Wi-Fi")
        .with_clickable("Connected", "connected-row")
}

pub fn details_screen() -> ScriptedScreen {
    ScriptedScreen::default()
        .with_text("Network details")
        .with_clickable("Share", "share-button")
}

pub fn qr_screen() -> ScriptedScreen {
    ScriptedScreen::default().with_text("Scan QR code to join HomeNet")
}

pub fn frame() -> Frame {
    Frame::new(vec![0; 16], 2, 2).unwrap()
}

/// Wait for the next event, failing the test if none arrives
pub async fn next_event(rx: &mut broadcast::Receiver<GatewayEvent>) -> GatewayEvent {
    tokio::time::timeout(Duration::from_secs(600), rx.recv())
        .await
        .expect("no event arrived")
        .expect("event channel closed")
}

/// Events already published, without waiting
pub fn drain(rx: &mut broadcast::Receiver<GatewayEvent>) -> Vec<GatewayEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
