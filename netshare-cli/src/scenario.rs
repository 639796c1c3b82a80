//! Scripted scenarios replayed against the engine.
//!
//! A scenario is a list of timed steps. Each step either drives the gateway the
//! way a caller would or changes what the scripted host shows and returns.

use anyhow::{bail, Context, Result};
use netshare::scripted::{
    ScriptedHost, ScriptedMirror, ScriptedScan, ScriptedScanner, ScriptedScreen, ScriptedUi,
};
use netshare::{
    AutomationConfig, Collaborators, DetectedCode, Engine, Frame, GatewayEvent, MirrorError,
    ScanError, ScreenSignal, SessionGateway,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A frame the scripted mirror hands out next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStep {
    Ok,
    Blocked,
    PermissionDenied,
    Failed(String),
}

/// A code the scripted scanner reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSpec {
    Raw(String),
    Wifi { ssid: String, password: String },
}

/// What the scripted scanner returns for its next frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStep {
    Codes(Vec<CodeSpec>),
    DecoderError(String),
    Crash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    StartSession,
    StopSession,
    Signal(ScreenSignal),
    SetScreen(ScriptedScreen),
    ClearScreen,
    SetMirrorReady(bool),
    QueueFrame(FrameStep),
    SetPrewarmFrame(bool),
    QueueScan(ScanStep),
    SetWifiPassword(Option<String>),
    RequestScreenCapture,
    PermissionResult(bool),
    CaptureOnce,
    CaptureFromPrewarm,
    PrewarmStart,
    PrewarmStop,
    ResetConnectivitySessionFlags,
    ConnectivityFlowStart,
    ConnectivityFlowEnd,
    OpenWifiSettings,
    GetWifiPassword,
    SetSecureWindow(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Offset from the start of the replay (milliseconds)
    #[serde(default)]
    pub at_ms: u64,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Window shown before the first step
    #[serde(default)]
    pub screen: Option<ScriptedScreen>,
    #[serde(default = "default_true")]
    pub mirror_ready: bool,
    /// How long to keep running after the last step (milliseconds)
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    pub steps: Vec<Step>,
}

fn default_true() -> bool {
    true
}

fn default_settle_ms() -> u64 {
    3_000
}

impl Scenario {
    /// Load a scenario file. `.yaml`/`.yml` files are read as YAML, anything else as JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        let scenario: Scenario = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::parse_yaml(&content)
                .with_context(|| format!("invalid YAML scenario {}", path.display()))?,
            _ => serde_json::from_str(&content)
                .with_context(|| format!("invalid JSON scenario {}", path.display()))?,
        };
        scenario.validate()?;
        Ok(scenario)
    }

    /// Steps are written as single-key maps (`queue_frame: ok`) rather than
    /// YAML tags, so enums are read through serde_yaml's singleton-map adapter.
    pub fn parse_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::with::singleton_map_recursive::deserialize(
            serde_yaml::Deserializer::from_str(content),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(pair) = self.steps.windows(2).find(|w| w[1].at_ms < w[0].at_ms) {
            bail!(
                "steps must be in time order: {}ms comes after {}ms",
                pair[1].at_ms,
                pair[0].at_ms
            );
        }
        Ok(())
    }
}

struct Rig {
    ui: Arc<ScriptedUi>,
    mirror: Arc<ScriptedMirror>,
    scanner: Arc<ScriptedScanner>,
    host: Arc<ScriptedHost>,
}

/// Run `scenario` to completion and return every event it produced, in order.
/// `on_event` sees each event as it is published.
pub async fn replay<F>(
    scenario: &Scenario,
    config: AutomationConfig,
    mut on_event: F,
) -> Result<Vec<GatewayEvent>>
where
    F: FnMut(&GatewayEvent) + Send + 'static,
{
    let rig = Rig {
        ui: Arc::new(ScriptedUi::new(scenario.screen.clone().unwrap_or_default())),
        mirror: Arc::new(ScriptedMirror::default()),
        scanner: Arc::new(ScriptedScanner::default()),
        host: Arc::new(ScriptedHost::default()),
    };
    rig.mirror.set_ready(scenario.mirror_ready);

    let (gateway, engine) = Engine::spawn(
        config,
        Collaborators {
            ui: rig.ui.clone(),
            mirror: rig.mirror.clone(),
            scanner: rig.scanner.clone(),
            host: rig.host.clone(),
        },
    )
    .context("failed to start the automation engine")?;

    let mut events = gateway.subscribe();
    let collector = tokio::spawn(async move {
        let mut seen = Vec::new();
        loop {
            match events.recv().await {
                Ok(event) => {
                    on_event(&event);
                    seen.push(event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event consumer fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        seen
    });

    let start = Instant::now();
    info!(steps = scenario.steps.len(), "replaying scenario");
    for step in &scenario.steps {
        tokio::time::sleep_until(start + Duration::from_millis(step.at_ms)).await;
        debug!(at_ms = step.at_ms, action = ?step.action, "step");
        apply(&gateway, &rig, &step.action).await?;
    }
    tokio::time::sleep(Duration::from_millis(scenario.settle_ms)).await;

    gateway.shutdown().await;
    drop(gateway);
    engine.await.context("engine task failed")?;
    let seen = collector.await.context("event collector failed")?;
    info!(events = seen.len(), "scenario finished");
    Ok(seen)
}

async fn apply(gateway: &SessionGateway, rig: &Rig, action: &Action) -> Result<()> {
    match action {
        Action::StartSession => gateway.start_session().await,
        Action::StopSession => gateway.stop_session().await,
        Action::Signal(signal) => gateway.screen_signal(signal.clone()).await,
        Action::SetScreen(screen) => rig.ui.set_screen(screen.clone()),
        Action::ClearScreen => rig.ui.clear_screen(),
        Action::SetMirrorReady(ready) => rig.mirror.set_ready(*ready),
        Action::QueueFrame(step) => rig.mirror.push_frame(frame_for(step)),
        Action::SetPrewarmFrame(present) => rig
            .mirror
            .set_prewarm_frame(present.then(placeholder_frame)),
        Action::QueueScan(step) => rig.scanner.push(scan_for(step)),
        Action::SetWifiPassword(password) => rig.host.set_password(password.clone()),
        Action::RequestScreenCapture => {
            let launched = gateway.request_screen_capture().await?;
            info!(launched, "screen capture requested");
        }
        Action::PermissionResult(granted) => gateway.permission_result(*granted).await,
        Action::CaptureOnce => gateway.capture_once().await,
        Action::CaptureFromPrewarm => {
            let obtained = gateway.capture_from_prewarm().await?;
            info!(obtained, "prewarm capture requested");
        }
        Action::PrewarmStart => gateway.prewarm_start().await,
        Action::PrewarmStop => gateway.prewarm_stop().await,
        Action::ResetConnectivitySessionFlags => gateway.reset_connectivity_session_flags().await,
        Action::ConnectivityFlowStart => gateway.connectivity_flow_start().await,
        Action::ConnectivityFlowEnd => gateway.connectivity_flow_end().await,
        Action::OpenWifiSettings => {
            let opened = gateway.open_wifi_settings().await?;
            info!(opened, "wifi settings requested");
        }
        Action::GetWifiPassword => {
            let password = gateway.get_wifi_password().await?;
            info!(password_len = password.chars().count(), "wifi password fetched");
        }
        Action::SetSecureWindow(enable) => gateway.set_secure_window(*enable).await,
    }
    Ok(())
}

fn placeholder_frame() -> Frame {
    Frame::from_image(image::RgbaImage::new(4, 4))
}

fn frame_for(step: &FrameStep) -> Result<Frame, MirrorError> {
    match step {
        FrameStep::Ok => Ok(placeholder_frame()),
        FrameStep::Blocked => Err(MirrorError::Blocked),
        FrameStep::PermissionDenied => Err(MirrorError::PermissionDenied),
        FrameStep::Failed(message) => Err(MirrorError::Failed(message.clone())),
    }
}

fn scan_for(step: &ScanStep) -> ScriptedScan {
    match step {
        ScanStep::Codes(codes) => ScriptedScan::Codes(
            codes
                .iter()
                .map(|code| match code {
                    CodeSpec::Raw(raw) => DetectedCode::raw(raw.clone()),
                    CodeSpec::Wifi { ssid, password } => {
                        DetectedCode::wifi(ssid.clone(), password.clone())
                    }
                })
                .collect(),
        ),
        ScanStep::DecoderError(message) => {
            ScriptedScan::Error(ScanError::Decoder(message.clone()))
        }
        ScanStep::Crash => ScriptedScan::Panic,
    }
}
