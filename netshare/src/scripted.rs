//! In-memory collaborators for tests and scenario replay.
//!
//! Each type records what the engine asked of it so callers can assert on the
//! interaction afterwards. State sits behind a `Mutex`; a poisoned lock is
//! recovered rather than propagated.

use crate::capture::{DetectedCode, QrScanner, ScreenMirror};
use crate::errors::{MirrorError, ScanError};
use crate::frame::Frame;
use crate::host::HostActions;
use crate::selector::Selector;
use crate::ui::{ElementHandle, Screen, UiQuery};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn default_true() -> bool {
    true
}

/// An element on a scripted screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedElement {
    pub id: String,
    pub label: String,
    #[serde(default = "default_true")]
    pub clickable: bool,
    /// The host reports a failed click action for this element
    #[serde(default)]
    pub click_fails: bool,
}

/// Contents of one scripted window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptedScreen {
    /// Plain text nodes
    pub texts: Vec<String>,
    pub elements: Vec<ScriptedElement>,
}

impl ScriptedScreen {
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.texts.push(text.into());
        self
    }

    pub fn with_clickable(mut self, label: impl Into<String>, id: impl Into<String>) -> Self {
        self.elements.push(ScriptedElement {
            id: id.into(),
            label: label.into(),
            clickable: true,
            click_fails: false,
        });
        self
    }

    pub fn with_label(mut self, label: impl Into<String>, id: impl Into<String>) -> Self {
        self.elements.push(ScriptedElement {
            id: id.into(),
            label: label.into(),
            clickable: false,
            click_fails: false,
        });
        self
    }

    /// A clickable element whose click action fails
    pub fn with_broken_button(mut self, label: impl Into<String>, id: impl Into<String>) -> Self {
        self.elements.push(ScriptedElement {
            id: id.into(),
            label: label.into(),
            clickable: true,
            click_fails: true,
        });
        self
    }

    fn find(&self, selector: &Selector) -> Option<&ScriptedElement> {
        selector.alternatives().into_iter().find_map(|leaf| {
            let wanted = match leaf {
                Selector::Text(value) | Selector::Description(value) => value.as_str(),
                Selector::AnyOf(_) => return None,
            };
            self.elements
                .iter()
                .find(|e| e.label == wanted)
                .or_else(|| self.elements.iter().find(|e| e.label.contains(wanted)))
        })
    }
}

struct ScreenView<'a> {
    screen: ScriptedScreen,
    clicks: &'a Mutex<Vec<String>>,
}

impl Screen for ScreenView<'_> {
    fn has_text(&self, hint: &str) -> bool {
        self.screen.texts.iter().any(|text| text.contains(hint))
    }

    fn locate(&self, selector: &Selector) -> Option<ElementHandle> {
        self.screen
            .find(selector)
            .map(|e| ElementHandle::new(e.id.clone(), e.clickable))
    }

    fn click(&self, element: &ElementHandle) -> bool {
        let clicked = self
            .screen
            .elements
            .iter()
            .any(|e| e.id == element.id && e.clickable && !e.click_fails);
        if clicked {
            lock(self.clicks).push(element.id.clone());
        }
        clicked
    }
}

/// A scripted accessibility tree; the current window can be swapped at any time
#[derive(Debug, Default)]
pub struct ScriptedUi {
    screen: Mutex<Option<ScriptedScreen>>,
    requests: AtomicUsize,
    clicks: Mutex<Vec<String>>,
}

impl ScriptedUi {
    pub fn new(screen: ScriptedScreen) -> Self {
        Self {
            screen: Mutex::new(Some(screen)),
            ..Self::default()
        }
    }

    /// A host that has no active window
    pub fn without_window() -> Self {
        Self::default()
    }

    pub fn set_screen(&self, screen: ScriptedScreen) {
        *lock(&self.screen) = Some(screen);
    }

    pub fn clear_screen(&self) {
        *lock(&self.screen) = None;
    }

    /// How often the active window was asked for
    pub fn screen_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Ids of successfully clicked elements, in order
    pub fn clicks(&self) -> Vec<String> {
        lock(&self.clicks).clone()
    }
}

impl UiQuery for ScriptedUi {
    fn active_screen(&self) -> Option<Box<dyn Screen + '_>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let screen = lock(&self.screen).clone()?;
        Some(Box::new(ScreenView {
            screen,
            clicks: &self.clicks,
        }))
    }
}

/// Calls made on a [`ScriptedMirror`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorCall {
    OpenStream,
    StopStream,
    Release,
    StartPrewarm,
    StopPrewarm,
}

#[derive(Debug, Default)]
struct MirrorState {
    ready: bool,
    prewarming: bool,
    open_error: Option<MirrorError>,
    frames: VecDeque<Result<Frame, MirrorError>>,
    prewarm_frame: Option<Frame>,
    streams_opened: usize,
    calls: Vec<MirrorCall>,
}

/// A mirroring resource fed from a frame queue.
///
/// `next_frame` pops the queue; with nothing queued it never resolves, which is
/// how a stalled stream looks to the engine.
#[derive(Debug, Default)]
pub struct ScriptedMirror {
    state: Mutex<MirrorState>,
}

impl ScriptedMirror {
    pub fn ready() -> Self {
        let mirror = Self::default();
        mirror.set_ready(true);
        mirror
    }

    pub fn set_ready(&self, ready: bool) {
        lock(&self.state).ready = ready;
    }

    pub fn push_frame(&self, frame: Result<Frame, MirrorError>) {
        lock(&self.state).frames.push_back(frame);
    }

    /// Make the next `open_stream` calls fail
    pub fn fail_open(&self, error: Option<MirrorError>) {
        lock(&self.state).open_error = error;
    }

    pub fn set_prewarm_frame(&self, frame: Option<Frame>) {
        lock(&self.state).prewarm_frame = frame;
    }

    pub fn streams_opened(&self) -> usize {
        lock(&self.state).streams_opened
    }

    pub fn calls(&self) -> Vec<MirrorCall> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }
}

#[async_trait]
impl ScreenMirror for ScriptedMirror {
    fn is_ready(&self) -> bool {
        lock(&self.state).ready
    }

    fn open_stream(&self) -> Result<(), MirrorError> {
        let mut state = lock(&self.state);
        state.calls.push(MirrorCall::OpenStream);
        if let Some(err) = state.open_error.clone() {
            return Err(err);
        }
        state.streams_opened += 1;
        Ok(())
    }

    async fn next_frame(&self) -> Result<Frame, MirrorError> {
        let next = lock(&self.state).frames.pop_front();
        match next {
            Some(frame) => frame,
            None => std::future::pending().await,
        }
    }

    fn stop_stream(&self) {
        lock(&self.state).calls.push(MirrorCall::StopStream);
    }

    fn release(&self) {
        lock(&self.state).calls.push(MirrorCall::Release);
    }

    fn start_prewarm(&self) -> Result<(), MirrorError> {
        let mut state = lock(&self.state);
        if !state.ready {
            return Err(MirrorError::PermissionDenied);
        }
        state.calls.push(MirrorCall::StartPrewarm);
        state.prewarming = true;
        Ok(())
    }

    fn stop_prewarm(&self) {
        let mut state = lock(&self.state);
        state.calls.push(MirrorCall::StopPrewarm);
        state.prewarming = false;
    }

    fn is_prewarming(&self) -> bool {
        lock(&self.state).prewarming
    }

    fn latest_prewarm_frame(&self) -> Option<Frame> {
        let state = lock(&self.state);
        if state.prewarming {
            state.prewarm_frame.clone()
        } else {
            None
        }
    }
}

/// One queued scanner result
#[derive(Debug, Clone)]
pub enum ScriptedScan {
    Codes(Vec<DetectedCode>),
    Error(ScanError),
    /// The decoder crashes
    Panic,
}

/// A scanner answering from a queue. An empty queue finds nothing.
#[derive(Debug, Default)]
pub struct ScriptedScanner {
    results: Mutex<VecDeque<ScriptedScan>>,
    scans: AtomicUsize,
}

impl ScriptedScanner {
    pub fn push(&self, result: ScriptedScan) {
        lock(&self.results).push_back(result);
    }

    pub fn push_codes(&self, codes: Vec<DetectedCode>) {
        self.push(ScriptedScan::Codes(codes));
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl QrScanner for ScriptedScanner {
    fn scan(&self, _frame: &Frame) -> Result<Vec<DetectedCode>, ScanError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.results).pop_front();
        match next {
            None => Ok(Vec::new()),
            Some(ScriptedScan::Codes(codes)) => Ok(codes),
            Some(ScriptedScan::Error(err)) => Err(err),
            Some(ScriptedScan::Panic) => panic!("scripted decoder crash"),
        }
    }
}

/// Calls made on a [`ScriptedHost`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCall {
    OpenWifiSettings,
    RequestScreenCapture,
    BringToForeground,
    SetSecureWindow(bool),
}

/// Host actions that always succeed unless told otherwise
#[derive(Debug)]
pub struct ScriptedHost {
    calls: Mutex<Vec<HostCall>>,
    password: Mutex<Option<String>>,
    can_launch: Mutex<bool>,
}

impl Default for ScriptedHost {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            password: Mutex::new(None),
            can_launch: Mutex::new(true),
        }
    }
}

impl ScriptedHost {
    pub fn with_password(password: impl Into<String>) -> Self {
        let host = Self::default();
        host.set_password(Some(password.into()));
        host
    }

    pub fn set_password(&self, password: Option<String>) {
        *lock(&self.password) = password;
    }

    /// Whether settings screens and permission prompts can be launched
    pub fn set_can_launch(&self, can_launch: bool) {
        *lock(&self.can_launch) = can_launch;
    }

    pub fn calls(&self) -> Vec<HostCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: HostCall) {
        lock(&self.calls).push(call);
    }
}

impl HostActions for ScriptedHost {
    fn open_wifi_settings(&self) -> bool {
        self.record(HostCall::OpenWifiSettings);
        *lock(&self.can_launch)
    }

    fn request_screen_capture(&self) -> bool {
        self.record(HostCall::RequestScreenCapture);
        *lock(&self.can_launch)
    }

    fn bring_to_foreground(&self) {
        self.record(HostCall::BringToForeground);
    }

    fn wifi_password(&self) -> Option<String> {
        lock(&self.password).clone()
    }

    fn set_secure_window(&self, enable: bool) {
        self.record(HostCall::SetSecureWindow(enable));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::find_and_click;

    #[test]
    fn test_locate_prefers_exact_label() {
        let screen = ScriptedScreen::default()
            .with_clickable("Connected, secured", "secured")
            .with_clickable("Connected", "plain");
        let ui = ScriptedUi::new(screen);
        let view = ui.active_screen().unwrap();

        let found = view.locate(&Selector::from("Connected")).unwrap();
        assert_eq!(found.id, "plain");
        assert!(view.locate(&Selector::from("Forget")).is_none());
    }

    #[test]
    fn test_clickable_labels_are_not_text() {
        let ui = ScriptedUi::new(ScriptedScreen::default().with_clickable("QR code", "qr"));
        let view = ui.active_screen().unwrap();
        assert!(!view.has_text("QR"));
    }

    #[test]
    fn test_click_bookkeeping() {
        let ui = ScriptedUi::new(
            ScriptedScreen::default()
                .with_label("Share", "label")
                .with_broken_button("Connected", "row"),
        );
        {
            let view = ui.active_screen().unwrap();
            assert!(!find_and_click(view.as_ref(), &Selector::from("Share")));
            assert!(!find_and_click(view.as_ref(), &Selector::from("Connected")));
        }
        assert!(ui.clicks().is_empty());
        assert_eq!(ui.screen_requests(), 1);

        ui.clear_screen();
        assert!(ui.active_screen().is_none());
        assert_eq!(ui.screen_requests(), 2);
    }

    #[test]
    fn test_prewarm_frame_needs_running_prewarm() {
        let mirror = ScriptedMirror::default();
        mirror.set_prewarm_frame(Some(Frame::new(vec![0; 4], 1, 1).unwrap()));
        assert_eq!(mirror.start_prewarm(), Err(MirrorError::PermissionDenied));
        assert!(mirror.latest_prewarm_frame().is_none());

        mirror.set_ready(true);
        mirror.start_prewarm().unwrap();
        assert!(mirror.latest_prewarm_frame().is_some());
    }
}
