//! The accessibility seam: screen signals in, element queries and clicks out.
//!
//! Element search heuristics (locale strings, clickable ancestors and siblings)
//! belong to the host implementation of [`Screen`]. The core only asks whether a
//! hint is present and whether a located element could be clicked.

use crate::selector::Selector;
use serde::{Deserialize, Serialize};

/// Kind of change reported by the host accessibility layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    ContentChanged,
    StateChanged,
}

/// A "screen changed" notification from the foreground application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSignal {
    pub package: String,
    pub kind: SignalKind,
}

impl ScreenSignal {
    pub fn content_changed(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            kind: SignalKind::ContentChanged,
        }
    }

    pub fn state_changed(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            kind: SignalKind::StateChanged,
        }
    }
}

/// Opaque reference to an element found on the active screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub id: String,
    pub clickable: bool,
}

impl ElementHandle {
    pub fn new(id: impl Into<String>, clickable: bool) -> Self {
        Self {
            id: id.into(),
            clickable,
        }
    }
}

/// A snapshot of the active window
pub trait Screen {
    /// Whether any node's text or content description contains `hint`
    fn has_text(&self, hint: &str) -> bool;

    /// Locate the element best matching `selector`, resolving to something clickable if possible
    fn locate(&self, selector: &Selector) -> Option<ElementHandle>;

    /// Perform a click; `false` when the host reports the action failed
    fn click(&self, element: &ElementHandle) -> bool;
}

/// Access to the host's accessibility tree
pub trait UiQuery: Send + Sync {
    /// The active window, or `None` when the host has none to offer right now
    fn active_screen(&self) -> Option<Box<dyn Screen + '_>>;
}

/// Locate and click in one step. An element that is missing, not clickable,
/// or whose click fails all count as "not found yet".
pub fn find_and_click(screen: &dyn Screen, selector: &Selector) -> bool {
    match screen.locate(selector) {
        Some(element) if element.clickable => screen.click(&element),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct OneButton {
        clickable: bool,
        click_ok: bool,
        clicks: Cell<usize>,
    }

    impl Screen for OneButton {
        fn has_text(&self, _hint: &str) -> bool {
            false
        }

        fn locate(&self, selector: &Selector) -> Option<ElementHandle> {
            selector
                .alternatives()
                .into_iter()
                .any(|s| matches!(s, Selector::Text(t) if t == "Share"))
                .then(|| ElementHandle::new("share", self.clickable))
        }

        fn click(&self, _element: &ElementHandle) -> bool {
            self.clicks.set(self.clicks.get() + 1);
            self.click_ok
        }
    }

    #[test]
    fn test_find_and_click_success() {
        let screen = OneButton {
            clickable: true,
            click_ok: true,
            clicks: Cell::new(0),
        };
        assert!(find_and_click(&screen, &Selector::from("Share")));
        assert_eq!(screen.clicks.get(), 1);
    }

    #[test]
    fn test_not_clickable_is_not_clicked() {
        let screen = OneButton {
            clickable: false,
            click_ok: true,
            clicks: Cell::new(0),
        };
        assert!(!find_and_click(&screen, &Selector::from("Share")));
        assert_eq!(screen.clicks.get(), 0);
    }

    #[test]
    fn test_failed_click_and_missing_element_look_the_same() {
        let screen = OneButton {
            clickable: true,
            click_ok: false,
            clicks: Cell::new(0),
        };
        assert!(!find_and_click(&screen, &Selector::from("Share")));
        assert!(!find_and_click(&screen, &Selector::from("Details")));
    }
}
