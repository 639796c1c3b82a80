//! Wi-Fi share automation through accessibility signals
//!
//! This crate walks the OS Wi-Fi settings from the network list to the QR share
//! screen, captures that screen once and decodes the `WIFI:` payload it shows.
//! Host capabilities (the accessibility tree, screen mirroring, QR scanning and
//! app-level actions) are traits; the engine owns all state on a single tokio
//! task and talks to callers through a [`SessionGateway`].

pub mod audio;
pub mod capture;
pub mod config;
pub mod controller;
pub mod engine;
pub mod errors;
pub mod events;
pub mod flags;
pub mod frame;
pub mod gateway;
pub mod host;
pub mod payload;
pub mod scripted;
pub mod selector;
pub mod session;
pub mod ui;

pub use audio::SampleRing;
pub use capture::{
    select_wifi_payload, AttemptId, CaptureAction, CapturePipeline, CodeKind, DetectedCode,
    FrameSource, QrScanner, ScreenMirror,
};
pub use config::{AutomationConfig, PackageMatch};
pub use controller::{DebounceTicket, DebounceToken, PhaseController, Reaction, SignalDisposition};
pub use engine::{Collaborators, Engine};
pub use errors::{FailureReason, MirrorError, NetshareError, ScanError};
pub use events::{EventBus, GatewayEvent};
pub use flags::SessionFlags;
pub use frame::Frame;
pub use gateway::{EngineStatus, SessionGateway};
pub use host::HostActions;
pub use payload::QrPayload;
pub use selector::Selector;
pub use session::{Phase, Session, SessionId};
pub use ui::{find_and_click, ElementHandle, Screen, ScreenSignal, SignalKind, UiQuery};
