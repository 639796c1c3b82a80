//! Screen capture and QR decoding seams
//!
//! The mirroring resource and the QR scanner are host capabilities. This module
//! defines what the capture pipeline expects from them; [`pipeline`] holds the
//! attempt bookkeeping.

use crate::errors::{MirrorError, ScanError};
use crate::frame::Frame;
use crate::payload::QrPayload;
use async_trait::async_trait;

pub mod pipeline;

pub use pipeline::{AttemptId, CaptureAction, CapturePipeline, FrameSource};

/// The screen-mirroring resource. Holding it requires a user-granted permission.
#[async_trait]
pub trait ScreenMirror: Send + Sync {
    /// Whether permission has been granted and a stream can be opened
    fn is_ready(&self) -> bool;

    /// Open a one-shot stream for a single capture
    fn open_stream(&self) -> Result<(), MirrorError>;

    /// Wait for the next frame of the one-shot stream
    async fn next_frame(&self) -> Result<Frame, MirrorError>;

    /// Stop the one-shot stream if it is still running
    fn stop_stream(&self);

    /// Release what the last capture attempt held (surfaces, readers)
    fn release(&self);

    fn start_prewarm(&self) -> Result<(), MirrorError>;

    fn stop_prewarm(&self);

    fn is_prewarming(&self) -> bool;

    /// Most recent frame of the prewarm stream, if any arrived yet
    fn latest_prewarm_frame(&self) -> Option<Frame>;
}

/// What a scanner recognised a code as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeKind {
    /// The scanner decoded the Wi-Fi content type itself
    Wifi { ssid: String, password: String },
    Other,
}

/// A code found in a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedCode {
    pub kind: CodeKind,
    pub raw: Option<String>,
}

impl DetectedCode {
    pub fn wifi(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            kind: CodeKind::Wifi {
                ssid: ssid.into(),
                password: password.into(),
            },
            raw: None,
        }
    }

    pub fn raw(value: impl Into<String>) -> Self {
        Self {
            kind: CodeKind::Other,
            raw: Some(value.into()),
        }
    }
}

/// CPU-bound QR scanning. Called on the blocking pool.
pub trait QrScanner: Send + Sync {
    /// All codes found in `frame`. An empty list is "nothing found", not an error.
    fn scan(&self, frame: &Frame) -> Result<Vec<DetectedCode>, ScanError>;
}

/// Pick the Wi-Fi payload out of the detected codes.
///
/// A structured Wi-Fi code wins over a raw `WIFI:` string; otherwise the first raw
/// value with the `WIFI:` prefix is parsed.
pub fn select_wifi_payload(codes: &[DetectedCode]) -> Option<QrPayload> {
    let structured = codes.iter().find_map(|code| match &code.kind {
        CodeKind::Wifi { ssid, password } => {
            let mut payload = QrPayload::new(ssid.clone(), password.clone());
            if let Some(parsed) = code.raw.as_deref().and_then(QrPayload::parse) {
                payload.security = parsed.security;
                payload.hidden = parsed.hidden;
            }
            Some(payload)
        }
        CodeKind::Other => None,
    });
    structured.or_else(|| {
        codes
            .iter()
            .filter_map(|code| code.raw.as_deref())
            .find(|raw| QrPayload::is_wifi(raw))
            .and_then(QrPayload::parse)
    })
}
