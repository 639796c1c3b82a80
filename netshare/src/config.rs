//! Runtime configuration for the automation engine

use crate::errors::NetshareError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How an incoming signal's package is compared with the target package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageMatch {
    /// Package identifiers must be equal
    #[default]
    Exact,
    /// The signal's package only has to contain the target identifier.
    /// Accepts split-screen and OEM sub-packages such as `com.android.settings.intelligence`.
    Substring,
}

impl PackageMatch {
    pub fn matches(&self, target: &str, package: &str) -> bool {
        match self {
            PackageMatch::Exact => package == target,
            PackageMatch::Substring => package.contains(target),
        }
    }
}

/// Configuration for the automation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Package whose screen signals drive navigation
    pub target_package: String,

    pub package_match: PackageMatch,

    /// Session lifetime, measured from `start_session` (milliseconds)
    pub session_timeout_ms: u64,

    /// Quiet period after the latest screen signal before reacting (milliseconds)
    pub debounce_ms: u64,

    /// Hints that identify the QR share screen, checked in order
    pub qr_hints: Vec<String>,

    /// Labels of the connected network row in the Wi-Fi list
    pub connected_row_labels: Vec<String>,

    /// Labels of the share control on the network details screen
    pub share_labels: Vec<String>,

    /// Extra capture attempts after the first decode that finds no Wi-Fi QR
    pub max_capture_retries: u32,

    /// Delay before a capture retry (milliseconds)
    pub capture_retry_delay_ms: u64,

    /// Upper bound on waiting for a single frame (milliseconds)
    pub frame_timeout_ms: u64,

    /// Start a capture as soon as the QR screen is detected
    pub capture_on_qr_visible: bool,

    /// Capacity of the event broadcast channel
    pub event_buffer: usize,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            target_package: "com.android.settings".to_string(),
            package_match: PackageMatch::Exact,
            session_timeout_ms: 20_000,
            debounce_ms: 300,
            qr_hints: [
                "قم بقراءة رمز QR",      // AR: "Scan the QR code"
                "رمز QR",                // AR: "QR code"
                "رمز الاستجابة السريعة", // AR: "quick response code"
                "Scan QR code",
                "QR code",
                "Share Wi-Fi QR",
                "Share Wi-Fi",
                "QR",
                "رمز", // AR: "code"
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            connected_row_labels: ["متصل", "Connected", "Connected, secured", "متصل، محمي"]
                .into_iter()
                .map(String::from)
                .collect(),
            share_labels: ["مشاركة", "Share", "Share Wi-Fi", "مشاركة Wi-Fi"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_capture_retries: 1,
            capture_retry_delay_ms: 300,
            frame_timeout_ms: 2_000,
            capture_on_qr_visible: true,
            event_buffer: 64,
        }
    }
}

impl AutomationConfig {
    /// Load a configuration file. `.yaml`/`.yml` files are read as YAML, anything else as JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, NetshareError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: AutomationConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), NetshareError> {
        if self.target_package.trim().is_empty() {
            return Err(NetshareError::InvalidConfig(
                "target_package must not be empty".to_string(),
            ));
        }
        if self.session_timeout_ms == 0 {
            return Err(NetshareError::InvalidConfig(
                "session_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.debounce_ms == 0 {
            return Err(NetshareError::InvalidConfig(
                "debounce_ms must be greater than zero".to_string(),
            ));
        }
        if self.frame_timeout_ms == 0 {
            return Err(NetshareError::InvalidConfig(
                "frame_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.qr_hints.iter().all(|h| h.is_empty()) {
            return Err(NetshareError::InvalidConfig(
                "qr_hints must contain at least one non-empty hint".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(NetshareError::InvalidConfig(
                "event_buffer must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn capture_retry_delay(&self) -> Duration {
        Duration::from_millis(self.capture_retry_delay_ms)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AutomationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session_timeout(), Duration::from_secs(20));
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert_eq!(config.max_capture_retries, 1);
        assert_eq!(config.package_match, PackageMatch::Exact);
    }

    #[test]
    fn test_package_matching() {
        let target = "com.android.settings";
        assert!(PackageMatch::Exact.matches(target, "com.android.settings"));
        assert!(!PackageMatch::Exact.matches(target, "com.android.settings.intelligence"));
        assert!(PackageMatch::Substring.matches(target, "com.android.settings.intelligence"));
        assert!(!PackageMatch::Substring.matches(target, "com.android.launcher"));
    }

    #[test]
    fn test_partial_yaml_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "debounce_ms: 150\npackage_match: substring").unwrap();

        let config = AutomationConfig::from_file(file.path()).unwrap();
        assert_eq!(config.debounce_ms, 150);
        assert_eq!(config.package_match, PackageMatch::Substring);
        assert_eq!(config.session_timeout_ms, 20_000);
        assert_eq!(config.target_package, "com.android.settings");
    }

    #[test]
    fn test_json_file_rejects_invalid_values() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"session_timeout_ms": 0}}"#).unwrap();

        let err = AutomationConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, NetshareError::InvalidConfig(_)));
    }
}
