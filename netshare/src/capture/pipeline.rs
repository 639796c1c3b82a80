use super::{select_wifi_payload, DetectedCode, ScreenMirror};
use crate::errors::{FailureReason, MirrorError, ScanError};
use crate::events::{EventBus, GatewayEvent};
use crate::frame::Frame;
use crate::host::HostActions;
use crate::payload::QrPayload;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Identity of one capture attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0)
    }
}

/// Where an attempt takes its frames from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    /// A one-shot stream opened for this attempt
    Stream,
    /// The already-running prewarm stream
    Prewarm,
}

/// Asynchronous work the owner of the pipeline must carry out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureAction {
    None,
    /// Wait for the next frame of the one-shot stream, then call `on_frame`
    AwaitFrame { attempt: AttemptId },
    /// Decode `frame` off the owner context, then call `on_scan`
    Scan { attempt: AttemptId, frame: Frame },
    /// Call `on_retry` at `due`
    Retry { attempt: AttemptId, due: Instant },
}

#[derive(Debug, Clone)]
struct Attempt {
    id: AttemptId,
    source: FrameSource,
    retry_count: u32,
    delivered: bool,
    capturing: bool,
}

/// Produces exactly one terminal outcome per capture attempt.
///
/// The pipeline never awaits. Each entry point returns a [`CaptureAction`] and the
/// owner reports back with the attempt id it was given. Reports for any attempt
/// other than the current undelivered one are dropped.
pub struct CapturePipeline {
    mirror: Arc<dyn ScreenMirror>,
    host: Arc<dyn HostActions>,
    events: EventBus,
    max_retries: u32,
    retry_delay: Duration,
    next_id: u64,
    attempt: Option<Attempt>,
}

impl CapturePipeline {
    pub fn new(
        mirror: Arc<dyn ScreenMirror>,
        host: Arc<dyn HostActions>,
        events: EventBus,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            mirror,
            host,
            events,
            max_retries,
            retry_delay,
            next_id: 0,
            attempt: None,
        }
    }

    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.attempt.as_ref().map(|a| a.id)
    }

    pub fn is_capturing(&self) -> bool {
        self.attempt.as_ref().is_some_and(|a| a.capturing)
    }

    pub fn is_delivered(&self) -> bool {
        self.attempt.as_ref().is_some_and(|a| a.delivered)
    }

    pub fn retry_count(&self) -> u32 {
        self.attempt.as_ref().map_or(0, |a| a.retry_count)
    }

    /// Start a one-shot capture. No-op while another attempt is in flight.
    pub fn capture(&mut self) -> CaptureAction {
        if self.is_capturing() {
            debug!("capture already in flight, ignoring request");
            return CaptureAction::None;
        }
        let id = self.begin(FrameSource::Stream);
        if !self.mirror.is_ready() {
            warn!(attempt = %id, "mirroring not ready");
            self.send_failure(id, FailureReason::PermissionDenied);
            return CaptureAction::None;
        }
        self.open_stream(id)
    }

    /// Capture from the prewarm stream. Returns whether a frame was obtained.
    pub fn capture_from_prewarm(&mut self) -> (bool, CaptureAction) {
        if self.is_capturing() {
            debug!("capture already in flight, ignoring prewarm request");
            return (false, CaptureAction::None);
        }
        let id = self.begin(FrameSource::Prewarm);
        let action = self.pull_prewarm(id);
        (matches!(action, CaptureAction::Scan { .. }), action)
    }

    pub fn on_frame(
        &mut self,
        attempt: AttemptId,
        frame: Result<Frame, MirrorError>,
    ) -> CaptureAction {
        if !self.is_live(attempt) {
            debug!(attempt = %attempt, "dropping frame for stale attempt");
            return CaptureAction::None;
        }
        match frame {
            Ok(frame) => {
                debug!(
                    attempt = %attempt,
                    width = frame.width,
                    height = frame.height,
                    "frame acquired"
                );
                CaptureAction::Scan { attempt, frame }
            }
            Err(err) => {
                warn!(attempt = %attempt, error = %err, "frame acquisition failed");
                self.send_failure(attempt, FailureReason::from(&err));
                CaptureAction::None
            }
        }
    }

    pub fn on_scan(
        &mut self,
        attempt: AttemptId,
        result: Result<Vec<DetectedCode>, ScanError>,
        now: Instant,
    ) -> CaptureAction {
        if !self.is_live(attempt) {
            debug!(attempt = %attempt, "dropping scan result for stale attempt");
            return CaptureAction::None;
        }
        let codes = match result {
            Ok(codes) => codes,
            Err(err) => {
                warn!(attempt = %attempt, error = %err, "QR decoder failed");
                self.send_failure(attempt, FailureReason::DecodeFailed);
                return CaptureAction::None;
            }
        };

        if let Some(payload) = select_wifi_payload(&codes) {
            self.deliver(attempt, payload);
            return CaptureAction::None;
        }

        debug!(attempt = %attempt, codes = codes.len(), "no Wi-Fi QR in frame");
        let retries_left = self
            .attempt
            .as_ref()
            .is_some_and(|a| a.retry_count < self.max_retries);
        if !retries_left {
            self.send_failure(attempt, FailureReason::Timeout);
            return CaptureAction::None;
        }

        if let Some(a) = self.attempt.as_mut() {
            a.retry_count += 1;
            a.capturing = false;
            if a.source == FrameSource::Stream {
                self.mirror.stop_stream();
            }
            info!(attempt = %attempt, retry = a.retry_count, "scheduling capture retry");
        }
        CaptureAction::Retry {
            attempt,
            due: now + self.retry_delay,
        }
    }

    /// A scheduled retry came due. Ignored if the attempt finished or was superseded.
    pub fn on_retry(&mut self, attempt: AttemptId) -> CaptureAction {
        let source = match self.attempt.as_ref() {
            Some(a) if a.id == attempt && !a.delivered && !a.capturing => a.source,
            _ => {
                debug!(attempt = %attempt, "dropping superseded retry");
                return CaptureAction::None;
            }
        };
        match source {
            FrameSource::Stream => {
                if !self.mirror.is_ready() {
                    self.send_failure(attempt, FailureReason::PermissionDenied);
                    return CaptureAction::None;
                }
                self.open_stream(attempt)
            }
            FrameSource::Prewarm => self.pull_prewarm(attempt),
        }
    }

    /// Something unexpected happened while handling the attempt's frame
    pub fn on_capture_error(&mut self, attempt: AttemptId, message: &str) {
        if self.is_live(attempt) {
            warn!(attempt = %attempt, error = message, "capture error");
            self.send_failure(attempt, FailureReason::CaptureError);
        }
    }

    /// Hand the payload to the caller. Only the first outcome of an attempt counts.
    pub fn deliver(&mut self, attempt: AttemptId, payload: QrPayload) -> bool {
        info!(
            attempt = %attempt,
            ssid = %payload.ssid,
            password_len = payload.password.chars().count(),
            "Wi-Fi QR decoded"
        );
        self.finish(attempt, GatewayEvent::from(payload))
    }

    /// Report a terminal failure. Only the first outcome of an attempt counts.
    pub fn send_failure(&mut self, attempt: AttemptId, reason: FailureReason) -> bool {
        self.finish(attempt, GatewayEvent::from(reason))
    }

    /// Forget the current attempt; in-flight work and pending retries become stale
    pub fn reset(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            if attempt.capturing && attempt.source == FrameSource::Stream {
                self.mirror.stop_stream();
                self.mirror.release();
            }
            debug!(attempt = %attempt.id, "capture attempt reset");
        }
    }

    pub fn prewarm_start(&mut self) -> Result<(), MirrorError> {
        let one_shot_running = self
            .attempt
            .as_ref()
            .is_some_and(|a| a.capturing && a.source == FrameSource::Stream);
        if one_shot_running {
            warn!("one-shot capture in flight, not starting prewarm");
            return Ok(());
        }
        if self.mirror.is_prewarming() {
            return Ok(());
        }
        self.mirror.start_prewarm()?;
        info!("prewarm stream started");
        Ok(())
    }

    pub fn prewarm_stop(&mut self) {
        if self.mirror.is_prewarming() {
            self.mirror.stop_prewarm();
            info!("prewarm stream stopped");
        }
    }

    fn begin(&mut self, source: FrameSource) -> AttemptId {
        self.next_id += 1;
        let id = AttemptId(self.next_id);
        if let Some(previous) = self.attempt.as_ref() {
            if !previous.delivered {
                debug!(previous = %previous.id, "superseding undelivered attempt");
            }
        }
        self.attempt = Some(Attempt {
            id,
            source,
            retry_count: 0,
            delivered: false,
            capturing: false,
        });
        debug!(attempt = %id, ?source, "capture attempt created");
        id
    }

    fn open_stream(&mut self, attempt: AttemptId) -> CaptureAction {
        // The prewarm stream and a one-shot stream never run together
        if self.mirror.is_prewarming() {
            self.mirror.stop_prewarm();
        }
        if let Err(err) = self.mirror.open_stream() {
            warn!(attempt = %attempt, error = %err, "could not open mirroring stream");
            self.send_failure(attempt, FailureReason::from(&err));
            return CaptureAction::None;
        }
        self.set_capturing(attempt);
        CaptureAction::AwaitFrame { attempt }
    }

    fn pull_prewarm(&mut self, attempt: AttemptId) -> CaptureAction {
        match self.mirror.latest_prewarm_frame() {
            Some(frame) => {
                self.set_capturing(attempt);
                CaptureAction::Scan { attempt, frame }
            }
            None => {
                warn!(attempt = %attempt, "no prewarm frame available");
                self.send_failure(attempt, FailureReason::NoFrame);
                CaptureAction::None
            }
        }
    }

    fn set_capturing(&mut self, attempt: AttemptId) {
        if let Some(a) = self.attempt.as_mut().filter(|a| a.id == attempt) {
            a.capturing = true;
        }
    }

    fn is_live(&self, attempt: AttemptId) -> bool {
        self.attempt
            .as_ref()
            .is_some_and(|a| a.id == attempt && !a.delivered)
    }

    fn finish(&mut self, attempt: AttemptId, outcome: GatewayEvent) -> bool {
        match self.attempt.as_mut() {
            Some(a) if a.id == attempt && !a.delivered => {
                a.delivered = true;
                a.capturing = false;
            }
            _ => {
                debug!(
                    attempt = %attempt,
                    outcome = outcome.name(),
                    "outcome already delivered, dropping"
                );
                return false;
            }
        }

        // Cleanup is identical for success and failure
        self.mirror.stop_stream();
        if self.mirror.is_prewarming() {
            self.mirror.stop_prewarm();
        }
        self.host.bring_to_foreground();
        if let GatewayEvent::Failure { reason } = &outcome {
            info!(attempt = %attempt, reason = %reason, "capture failed");
        }
        self.events.publish(outcome);
        self.mirror.release();
        true
    }
}
