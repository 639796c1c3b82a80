use crate::errors::NetshareError;
use crate::events::{EventBus, GatewayEvent};
use crate::flags::SessionFlags;
use crate::session::Phase;
use crate::ui::ScreenSignal;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, instrument};

/// Requests sent from a gateway handle to the engine task
#[derive(Debug)]
pub(crate) enum Command {
    StartSession,
    StopSession,
    ScreenSignal(ScreenSignal),
    RequestScreenCapture { reply: oneshot::Sender<bool> },
    PermissionResult { granted: bool },
    CaptureOnce,
    CaptureFromPrewarm { reply: oneshot::Sender<bool> },
    PrewarmStart,
    PrewarmStop,
    ResetFlags,
    FlowStart,
    FlowEnd,
    GetWifiPassword { reply: oneshot::Sender<String> },
    OpenWifiSettings { reply: oneshot::Sender<bool> },
    SetSecureWindow(bool),
    Status { reply: oneshot::Sender<EngineStatus> },
    Shutdown,
}

/// Point-in-time view of the engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub phase: Phase,
    pub session_active: bool,
    pub flags: SessionFlags,
    pub capturing: bool,
}

/// Handle to a running automation engine.
///
/// Cloning is cheap. The engine stops once every handle is dropped or
/// [`SessionGateway::shutdown`] is called. Fire-and-forget commands sent to a
/// stopped engine are dropped; commands that expect an answer fail with
/// [`NetshareError::EngineClosed`].
#[derive(Debug, Clone)]
pub struct SessionGateway {
    commands: mpsc::Sender<Command>,
    events: EventBus,
}

impl SessionGateway {
    pub(crate) fn new(commands: mpsc::Sender<Command>, events: EventBus) -> Self {
        Self { commands, events }
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn start_session(&self) {
        self.send(Command::StartSession).await;
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn stop_session(&self) {
        self.send(Command::StopSession).await;
    }

    /// Forward a screen-change notification from the host accessibility layer
    #[instrument(level = "debug", skip(self))]
    pub async fn screen_signal(&self, signal: ScreenSignal) {
        self.send(Command::ScreenSignal(signal)).await;
    }

    /// Ask for mirroring permission. `true` when a prompt was launched, one is
    /// already pending, or permission is already held.
    #[instrument(level = "debug", skip(self))]
    pub async fn request_screen_capture(&self) -> Result<bool, NetshareError> {
        self.request(|reply| Command::RequestScreenCapture { reply }).await
    }

    /// Report the user's answer to the permission prompt
    #[instrument(level = "debug", skip(self))]
    pub async fn permission_result(&self, granted: bool) {
        self.send(Command::PermissionResult { granted }).await;
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn capture_once(&self) {
        self.send(Command::CaptureOnce).await;
    }

    /// Capture from the prewarm stream; `true` if a frame was available
    #[instrument(level = "debug", skip(self))]
    pub async fn capture_from_prewarm(&self) -> Result<bool, NetshareError> {
        self.request(|reply| Command::CaptureFromPrewarm { reply }).await
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn prewarm_start(&self) {
        self.send(Command::PrewarmStart).await;
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn prewarm_stop(&self) {
        self.send(Command::PrewarmStop).await;
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn reset_connectivity_session_flags(&self) {
        self.send(Command::ResetFlags).await;
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn connectivity_flow_start(&self) {
        self.send(Command::FlowStart).await;
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn connectivity_flow_end(&self) {
        self.send(Command::FlowEnd).await;
    }

    /// Password of the connected network as the host knows it, empty if unknown
    #[instrument(level = "debug", skip(self))]
    pub async fn get_wifi_password(&self) -> Result<String, NetshareError> {
        self.request(|reply| Command::GetWifiPassword { reply }).await
    }

    /// Open the Wi-Fi settings once per flow. `false` if already opened or the
    /// host could not open them.
    #[instrument(level = "debug", skip(self))]
    pub async fn open_wifi_settings(&self) -> Result<bool, NetshareError> {
        self.request(|reply| Command::OpenWifiSettings { reply }).await
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn set_secure_window(&self, enable: bool) {
        self.send(Command::SetSecureWindow(enable)).await;
    }

    pub async fn status(&self) -> Result<EngineStatus, NetshareError> {
        self.request(|reply| Command::Status { reply }).await
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn shutdown(&self) {
        self.send(Command::Shutdown).await;
    }

    async fn send(&self, command: Command) {
        if let Err(e) = self.commands.send(command).await {
            debug!(command = ?e.0, "engine closed, dropping command");
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, NetshareError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| NetshareError::EngineClosed)?;
        response.await.map_err(|_| NetshareError::EngineClosed)
    }
}
