use crate::errors::FailureReason;
use crate::payload::QrPayload;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Asynchronous notifications delivered to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// The Wi-Fi list is on screen (callers use it to prewarm mirroring)
    SettingsListVisible,
    QrVisible,
    ScreenCaptureReady,
    QrParsed { ssid: String, password: String },
    /// The share screen is protected against capture
    CaptureBlocked,
    Failure { reason: FailureReason },
}

impl GatewayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GatewayEvent::SettingsListVisible => "settings_list_visible",
            GatewayEvent::QrVisible => "qr_visible",
            GatewayEvent::ScreenCaptureReady => "screen_capture_ready",
            GatewayEvent::QrParsed { .. } => "qr_parsed",
            GatewayEvent::CaptureBlocked => "capture_blocked",
            GatewayEvent::Failure { .. } => "failure",
        }
    }

    /// Whether this event ends a capture attempt
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GatewayEvent::QrParsed { .. }
                | GatewayEvent::CaptureBlocked
                | GatewayEvent::Failure { .. }
        )
    }
}

impl From<QrPayload> for GatewayEvent {
    fn from(payload: QrPayload) -> Self {
        GatewayEvent::QrParsed {
            ssid: payload.ssid,
            password: payload.password,
        }
    }
}

impl From<FailureReason> for GatewayEvent {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::CaptureBlocked => GatewayEvent::CaptureBlocked,
            reason => GatewayEvent::Failure { reason },
        }
    }
}

/// Fan-out of gateway events to every subscriber.
///
/// Owned by one engine and handed to its components at construction.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GatewayEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _rx) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers. Having no subscriber is not an error.
    pub fn publish(&self, event: GatewayEvent) {
        debug!(event = event.name(), "publishing gateway event");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let parsed = GatewayEvent::QrParsed {
            ssid: "MyNet".into(),
            password: "pass123".into(),
        };
        let json = serde_json::to_value(&parsed).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "qr_parsed", "ssid": "MyNet", "password": "pass123"})
        );

        let failure = GatewayEvent::from(FailureReason::PermissionDenied);
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "failure", "reason": "PERMISSION_DENIED"})
        );

        let visible: GatewayEvent = serde_json::from_str(r#"{"event":"qr_visible"}"#).unwrap();
        assert_eq!(visible, GatewayEvent::QrVisible);
    }

    #[test]
    fn test_capture_blocked_has_its_own_event() {
        assert_eq!(
            GatewayEvent::from(FailureReason::CaptureBlocked),
            GatewayEvent::CaptureBlocked
        );
        assert!(GatewayEvent::CaptureBlocked.is_terminal());
        assert!(!GatewayEvent::QrVisible.is_terminal());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.publish(GatewayEvent::QrVisible);

        let mut rx = bus.subscribe();
        bus.publish(GatewayEvent::SettingsListVisible);
        assert_eq!(rx.recv().await.unwrap(), GatewayEvent::SettingsListVisible);
    }
}
