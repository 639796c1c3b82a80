//! The automation engine: one tokio task that owns every piece of mutable state.
//!
//! Commands arrive from [`SessionGateway`] handles. Timers, frame waits and
//! scans run as spawned tasks that report back through an internal channel, so
//! the controller, the capture pipeline and the flags are only ever touched
//! from the engine task.

use crate::capture::{
    AttemptId, CaptureAction, CapturePipeline, DetectedCode, QrScanner, ScreenMirror,
};
use crate::config::AutomationConfig;
use crate::controller::{
    DebounceTicket, DebounceToken, PhaseController, Reaction, SignalDisposition,
};
use crate::errors::{FailureReason, MirrorError, NetshareError, ScanError};
use crate::events::{EventBus, GatewayEvent};
use crate::flags::SessionFlags;
use crate::frame::Frame;
use crate::gateway::{Command, EngineStatus, SessionGateway};
use crate::host::HostActions;
use crate::ui::{ScreenSignal, UiQuery};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const COMMAND_BUFFER: usize = 64;

/// Host capabilities the engine drives
#[derive(Clone)]
pub struct Collaborators {
    pub ui: Arc<dyn UiQuery>,
    pub mirror: Arc<dyn ScreenMirror>,
    pub scanner: Arc<dyn QrScanner>,
    pub host: Arc<dyn HostActions>,
}

/// Results of work the engine spawned
#[derive(Debug)]
enum Internal {
    DebounceElapsed(DebounceToken),
    Frame {
        attempt: AttemptId,
        result: Result<Frame, MirrorError>,
    },
    Scanned {
        attempt: AttemptId,
        result: Result<Vec<DetectedCode>, ScanError>,
    },
    ScanCrashed {
        attempt: AttemptId,
        message: String,
    },
    RetryDue(AttemptId),
}

pub struct Engine {
    controller: PhaseController,
    pipeline: CapturePipeline,
    flags: SessionFlags,
    collaborators: Collaborators,
    events: EventBus,
    internal: mpsc::UnboundedSender<Internal>,
    frame_timeout: Duration,
    capture_on_qr_visible: bool,
    /// Cancelled whenever the current session stops
    session_token: CancellationToken,
    debounce_task: Option<JoinHandle<()>>,
    /// Cancelled whenever the capture pipeline is reset
    capture_token: CancellationToken,
}

impl Engine {
    /// Validate `config` and start the engine task.
    ///
    /// The task runs until [`SessionGateway::shutdown`] is called or every
    /// gateway handle has been dropped.
    pub fn spawn(
        config: AutomationConfig,
        collaborators: Collaborators,
    ) -> Result<(SessionGateway, JoinHandle<()>), NetshareError> {
        config.validate()?;

        let events = EventBus::new(config.event_buffer);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let engine = Engine {
            controller: PhaseController::new(&config, events.clone()),
            pipeline: CapturePipeline::new(
                collaborators.mirror.clone(),
                collaborators.host.clone(),
                events.clone(),
                config.max_capture_retries,
                config.capture_retry_delay(),
            ),
            flags: SessionFlags::default(),
            collaborators,
            events: events.clone(),
            internal: internal_tx,
            frame_timeout: config.frame_timeout(),
            capture_on_qr_visible: config.capture_on_qr_visible,
            session_token: CancellationToken::new(),
            debounce_task: None,
            capture_token: CancellationToken::new(),
        };

        info!(
            target_package = %config.target_package,
            package_match = ?config.package_match,
            "automation engine started"
        );
        let handle = tokio::spawn(engine.run(command_rx, internal_rx));
        Ok((SessionGateway::new(command_tx, events), handle))
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        debug!("engine loop running");
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Shutdown) => {
                        info!("shutdown requested");
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("all gateway handles dropped");
                        break;
                    }
                },
                Some(message) = internal.recv() => self.handle_internal(message),
            }
        }
        self.teardown();
        info!("automation engine stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartSession => self.start_session(),
            Command::StopSession => self.stop_session(),
            Command::ScreenSignal(signal) => self.on_screen_signal(signal),
            Command::RequestScreenCapture { reply } => {
                let _ = reply.send(self.request_screen_capture());
            }
            Command::PermissionResult { granted } => self.on_permission_result(granted),
            Command::CaptureOnce => {
                let action = self.pipeline.capture();
                self.execute(action);
            }
            Command::CaptureFromPrewarm { reply } => {
                let (obtained, action) = self.pipeline.capture_from_prewarm();
                self.execute(action);
                let _ = reply.send(obtained);
            }
            Command::PrewarmStart => {
                if let Err(e) = self.pipeline.prewarm_start() {
                    warn!(error = %e, "could not start prewarm stream");
                }
            }
            Command::PrewarmStop => self.pipeline.prewarm_stop(),
            Command::ResetFlags => {
                info!("resetting connectivity session flags");
                self.flags.reset();
                self.reset_capture();
            }
            Command::FlowStart => {
                info!("connectivity flow started");
                self.flags.begin_flow();
            }
            Command::FlowEnd => {
                info!("connectivity flow ended");
                self.flags.end_flow();
            }
            Command::GetWifiPassword { reply } => {
                let password = self.collaborators.host.wifi_password().unwrap_or_default();
                debug!(password_len = password.chars().count(), "wifi password looked up");
                let _ = reply.send(password);
            }
            Command::OpenWifiSettings { reply } => {
                let _ = reply.send(self.open_wifi_settings());
            }
            Command::SetSecureWindow(enable) => {
                debug!(enable, "toggling secure window");
                self.collaborators.host.set_secure_window(enable);
            }
            Command::Status { reply } => {
                let _ = reply.send(EngineStatus {
                    phase: self.controller.phase(),
                    session_active: self.controller.is_active(),
                    flags: self.flags,
                    capturing: self.pipeline.is_capturing(),
                });
            }
            Command::Shutdown => {}
        }
    }

    fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::DebounceElapsed(token) => self.on_debounce_elapsed(token),
            Internal::Frame { attempt, result } => {
                let action = self.pipeline.on_frame(attempt, result);
                self.execute(action);
            }
            Internal::Scanned { attempt, result } => {
                let action = self.pipeline.on_scan(attempt, result, Instant::now());
                self.execute(action);
            }
            Internal::ScanCrashed { attempt, message } => {
                error!(attempt = %attempt, error = %message, "QR scanner task failed");
                self.pipeline.on_capture_error(attempt, &message);
            }
            Internal::RetryDue(attempt) => {
                let action = self.pipeline.on_retry(attempt);
                self.execute(action);
            }
        }
    }

    fn start_session(&mut self) {
        if self.flags.a11y_started && self.controller.is_active() {
            debug!(
                session = %self.controller.session_id(),
                "session already running, ignoring start"
            );
            return;
        }
        self.cancel_debounce();
        self.controller.start(Instant::now());
        self.flags.a11y_started = true;
    }

    fn stop_session(&mut self) {
        self.cancel_debounce();
        self.controller.stop();
    }

    fn on_screen_signal(&mut self, signal: ScreenSignal) {
        match self.controller.on_signal(&signal, Instant::now()) {
            SignalDisposition::Ignored => {}
            SignalDisposition::TimedOut => self.cancel_debounce(),
            SignalDisposition::Debounce(ticket) => self.schedule_debounce(ticket),
        }
    }

    fn on_debounce_elapsed(&mut self, token: DebounceToken) {
        let reaction = self.controller.on_debounce_elapsed(
            token,
            self.collaborators.ui.as_ref(),
            Instant::now(),
        );
        debug!(?reaction, "debounced reaction finished");
        match reaction {
            Reaction::QrVisible => {
                self.cancel_debounce();
                if self.capture_on_qr_visible {
                    self.capture_after_qr();
                }
            }
            Reaction::TimedOut => self.cancel_debounce(),
            Reaction::Stale
            | Reaction::NoScreen
            | Reaction::Advanced(_)
            | Reaction::Waiting(_) => {}
        }
    }

    fn capture_after_qr(&mut self) {
        if self.collaborators.mirror.is_prewarming() {
            info!("QR visible, capturing from prewarm stream");
            let (_, action) = self.pipeline.capture_from_prewarm();
            self.execute(action);
        } else {
            info!("QR visible, starting one-shot capture");
            let action = self.pipeline.capture();
            self.execute(action);
        }
    }

    fn request_screen_capture(&mut self) -> bool {
        if self.collaborators.mirror.is_ready() {
            debug!("mirroring already permitted");
            self.events.publish(GatewayEvent::ScreenCaptureReady);
            return true;
        }
        if self.flags.waiting_for_permission {
            debug!("permission prompt already pending");
            return true;
        }
        let launched = self.collaborators.host.request_screen_capture();
        if launched {
            info!("screen capture permission requested");
            self.flags.waiting_for_permission = true;
        } else {
            warn!("could not launch screen capture permission prompt");
        }
        launched
    }

    fn on_permission_result(&mut self, granted: bool) {
        self.flags.waiting_for_permission = false;
        if granted {
            info!("screen capture permission granted");
            self.events.publish(GatewayEvent::ScreenCaptureReady);
        } else {
            warn!("screen capture permission denied");
            self.events.publish(GatewayEvent::from(FailureReason::PermissionDenied));
        }
    }

    fn open_wifi_settings(&mut self) -> bool {
        if !self.flags.try_launch_settings() {
            debug!("wifi settings already launched in this flow");
            return false;
        }
        let opened = self.collaborators.host.open_wifi_settings();
        if opened {
            info!("wifi settings opened");
        } else {
            warn!("could not open wifi settings");
            self.flags.settings_launched = false;
        }
        opened
    }

    fn schedule_debounce(&mut self, ticket: DebounceTicket) {
        if let Some(previous) = self.debounce_task.take() {
            previous.abort();
        }
        let cancelled = self.session_token.clone();
        let internal = self.internal.clone();
        self.debounce_task = Some(tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep_until(ticket.due) => {
                    let _ = internal.send(Internal::DebounceElapsed(ticket.token));
                }
            }
        }));
    }

    fn cancel_debounce(&mut self) {
        self.session_token.cancel();
        self.session_token = CancellationToken::new();
        if let Some(task) = self.debounce_task.take() {
            task.abort();
        }
    }

    fn reset_capture(&mut self) {
        self.capture_token.cancel();
        self.capture_token = CancellationToken::new();
        self.pipeline.reset();
    }

    /// Run the asynchronous half of a pipeline step
    fn execute(&mut self, action: CaptureAction) {
        let internal = self.internal.clone();
        let cancelled = self.capture_token.clone();
        match action {
            CaptureAction::None => {}
            CaptureAction::AwaitFrame { attempt } => {
                let mirror = self.collaborators.mirror.clone();
                let frame_timeout = self.frame_timeout;
                tokio::spawn(async move {
                    let result = tokio::select! {
                        _ = cancelled.cancelled() => return,
                        waited = tokio::time::timeout(frame_timeout, mirror.next_frame()) => {
                            waited.unwrap_or(Err(MirrorError::TimedOut))
                        }
                    };
                    let _ = internal.send(Internal::Frame { attempt, result });
                });
            }
            CaptureAction::Scan { attempt, frame } => {
                let scanner = self.collaborators.scanner.clone();
                tokio::spawn(async move {
                    let message =
                        match tokio::task::spawn_blocking(move || scanner.scan(&frame)).await {
                            Ok(result) => Internal::Scanned { attempt, result },
                            Err(e) => Internal::ScanCrashed {
                                attempt,
                                message: e.to_string(),
                            },
                        };
                    let _ = internal.send(message);
                });
            }
            CaptureAction::Retry { attempt, due } => {
                tokio::spawn(async move {
                    tokio::select! {
                        _ = cancelled.cancelled() => {}
                        _ = tokio::time::sleep_until(due) => {
                            let _ = internal.send(Internal::RetryDue(attempt));
                        }
                    }
                });
            }
        }
    }

    fn teardown(&mut self) {
        self.cancel_debounce();
        self.controller.stop();
        self.reset_capture();
        self.pipeline.prewarm_stop();
    }
}
