//! Phase controller: walks the Wi-Fi settings screens towards the QR share screen.
//!
//! The controller is a synchronous state machine. It never sleeps or spawns;
//! [`PhaseController::on_signal`] hands back a [`DebounceTicket`] and whoever owns
//! the controller calls [`PhaseController::on_debounce_elapsed`] once the ticket is due.
//! Only the most recent ticket of the current session is honoured, so a burst of
//! signals collapses into one reaction and nothing from a stopped session survives
//! into the next one.

use crate::config::{AutomationConfig, PackageMatch};
use crate::events::{EventBus, GatewayEvent};
use crate::selector::Selector;
use crate::session::{Phase, Session, SessionId};
use crate::ui::{find_and_click, Screen, ScreenSignal, UiQuery};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Identity of one scheduled reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebounceToken {
    pub session: SessionId,
    pub seq: u64,
}

/// A reaction to run at `due` unless superseded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTicket {
    pub token: DebounceToken,
    pub due: Instant,
}

/// What happened to an incoming screen signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDisposition {
    /// No active session, or the signal came from another package
    Ignored,
    /// The session deadline had passed; the session is now stopped
    TimedOut,
    /// A reaction is scheduled; any earlier ticket is now stale
    Debounce(DebounceTicket),
}

/// Outcome of a debounced reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// The ticket was superseded or its session is gone
    Stale,
    TimedOut,
    /// The host had no active window to inspect
    NoScreen,
    /// The QR screen is showing; the session has stopped
    QrVisible,
    Advanced(Phase),
    /// Nothing clickable yet, staying in this phase
    Waiting(Phase),
}

pub struct PhaseController {
    session: Session,
    target_package: String,
    package_match: PackageMatch,
    session_timeout: Duration,
    debounce: Duration,
    qr_hints: Vec<String>,
    connected_row: Selector,
    share_control: Selector,
    next_seq: u64,
    pending: Option<DebounceToken>,
    events: EventBus,
}

impl PhaseController {
    pub fn new(config: &AutomationConfig, events: EventBus) -> Self {
        Self {
            session: Session::idle(Instant::now()),
            target_package: config.target_package.clone(),
            package_match: config.package_match,
            session_timeout: config.session_timeout(),
            debounce: config.debounce(),
            qr_hints: config
                .qr_hints
                .iter()
                .filter(|h| !h.is_empty())
                .cloned()
                .collect(),
            connected_row: Selector::any_label(&config.connected_row_labels),
            share_control: Selector::any_label(&config.share_labels),
            next_seq: 0,
            pending: None,
            events,
        }
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn is_active(&self) -> bool {
        self.session.active
    }

    pub fn session_id(&self) -> SessionId {
        self.session.id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Begin a new session in the list phase. Any pending reaction of an
    /// earlier session becomes stale.
    pub fn start(&mut self, now: Instant) -> SessionId {
        self.pending = None;
        self.session = Session::start(self.session.id, now, self.session_timeout);
        info!(
            session = %self.session.id,
            timeout_ms = self.session_timeout.as_millis() as u64,
            "connectivity session started"
        );
        self.session.id
    }

    /// Stop the session and drop any pending reaction. Idempotent.
    pub fn stop(&mut self) {
        self.pending = None;
        if self.session.active {
            info!(
                session = %self.session.id,
                phase = %self.session.phase,
                "connectivity session stopped"
            );
        }
        self.session.stop();
    }

    pub fn on_signal(&mut self, signal: &ScreenSignal, now: Instant) -> SignalDisposition {
        if !self.session.active {
            return SignalDisposition::Ignored;
        }
        if self.session.is_expired(now) {
            info!(session = %self.session.id, "session deadline passed, stopping");
            self.stop();
            return SignalDisposition::TimedOut;
        }
        if !self
            .package_match
            .matches(&self.target_package, &signal.package)
        {
            debug!(package = %signal.package, "ignoring signal from other package");
            return SignalDisposition::Ignored;
        }

        self.next_seq += 1;
        let token = DebounceToken {
            session: self.session.id,
            seq: self.next_seq,
        };
        if let Some(previous) = self.pending.replace(token) {
            debug!(seq = previous.seq, "superseding pending reaction");
        }
        debug!(
            session = %self.session.id,
            phase = %self.session.phase,
            kind = ?signal.kind,
            seq = token.seq,
            "scheduling debounced reaction"
        );
        SignalDisposition::Debounce(DebounceTicket {
            token,
            due: now + self.debounce,
        })
    }

    /// Run the reaction for `token` against the current phase
    pub fn on_debounce_elapsed(
        &mut self,
        token: DebounceToken,
        ui: &dyn UiQuery,
        now: Instant,
    ) -> Reaction {
        if self.pending != Some(token)
            || !self.session.active
            || self.session.id != token.session
        {
            debug!(seq = token.seq, "dropping stale reaction");
            return Reaction::Stale;
        }
        self.pending = None;

        if self.session.is_expired(now) {
            info!(session = %self.session.id, "session deadline passed before reaction, stopping");
            self.stop();
            return Reaction::TimedOut;
        }

        let Some(screen) = ui.active_screen() else {
            debug!("no active window");
            return Reaction::NoScreen;
        };

        // QR detection wins over phase routing, whatever phase we think we are in
        if self.is_qr_visible(screen.as_ref()) {
            self.on_qr_visible();
            return Reaction::QrVisible;
        }

        match self.session.phase {
            Phase::List => {
                // Sent on every list reaction so callers can prewarm mirroring
                self.events.publish(GatewayEvent::SettingsListVisible);
                self.click_and_advance(screen.as_ref(), Phase::Details)
            }
            Phase::Details => self.click_and_advance(screen.as_ref(), Phase::Share),
            Phase::Share => {
                debug!("waiting for the QR screen");
                Reaction::Waiting(Phase::Share)
            }
            phase @ (Phase::Idle | Phase::Qr) => Reaction::Waiting(phase),
        }
    }

    fn is_qr_visible(&self, screen: &dyn Screen) -> bool {
        match self.qr_hints.iter().find(|hint| screen.has_text(hint)) {
            Some(hint) => {
                debug!(hint = %hint, "QR screen detected");
                true
            }
            None => false,
        }
    }

    fn on_qr_visible(&mut self) {
        self.session.advance(Phase::Qr);
        info!(session = %self.session.id, "QR screen visible");
        self.events.publish(GatewayEvent::QrVisible);
        self.stop();
    }

    fn click_and_advance(&mut self, screen: &dyn Screen, next: Phase) -> Reaction {
        let selector = match next {
            Phase::Details => &self.connected_row,
            _ => &self.share_control,
        };
        if find_and_click(screen, selector) {
            info!(
                session = %self.session.id,
                from = %self.session.phase,
                to = %next,
                "clicked, advancing"
            );
            self.session.advance(next);
            Reaction::Advanced(next)
        } else {
            debug!(phase = %self.session.phase, "target not found yet");
            Reaction::Waiting(self.session.phase)
        }
    }
}
