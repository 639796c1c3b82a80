use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetshareError {
    #[error("Automation engine is not running")]
    EngineClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for NetshareError {
    fn from(err: serde_json::Error) -> Self {
        NetshareError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for NetshareError {
    fn from(err: serde_yaml::Error) -> Self {
        NetshareError::Serialization(err.to_string())
    }
}

/// Errors reported by the screen-mirroring resource
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MirrorError {
    /// The content on screen refuses to be captured (screenshot protection)
    #[error("Screen capture blocked by the foreground content")]
    Blocked,

    #[error("Screen capture permission denied")]
    PermissionDenied,

    #[error("No frame arrived in time")]
    TimedOut,

    #[error("Mirroring failed: {0}")]
    Failed(String),
}

/// Technical failure of the QR scanner, as opposed to "no code found"
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}

/// Terminal capture failures as they travel to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    PermissionDenied,
    CaptureBlocked,
    DecodeFailed,
    Timeout,
    NoFrame,
    CaptureError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::PermissionDenied => "PERMISSION_DENIED",
            FailureReason::CaptureBlocked => "CAPTURE_BLOCKED",
            FailureReason::DecodeFailed => "DECODE_FAILED",
            FailureReason::Timeout => "TIMEOUT",
            FailureReason::NoFrame => "NO_FRAME",
            FailureReason::CaptureError => "CAPTURE_ERROR",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&MirrorError> for FailureReason {
    fn from(err: &MirrorError) -> Self {
        match err {
            MirrorError::Blocked => FailureReason::CaptureBlocked,
            MirrorError::PermissionDenied => FailureReason::PermissionDenied,
            MirrorError::TimedOut => FailureReason::Timeout,
            MirrorError::Failed(_) => FailureReason::CaptureError,
        }
    }
}
