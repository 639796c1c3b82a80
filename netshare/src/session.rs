//! Navigation session state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Navigation stage. Ordering follows the forward direction of the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    /// Wi-Fi network list
    List,
    /// Connected network details
    Details,
    /// Share control clicked, waiting for the QR screen
    Share,
    Qr,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::List => "list",
            Phase::Details => "details",
            Phase::Share => "share",
            Phase::Qr => "qr",
        };
        f.write_str(name)
    }
}

/// Generation number of a session; a new `start` always gets a new one
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// A single automation attempt
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub phase: Phase,
    pub active: bool,
    pub deadline: Instant,
}

impl Session {
    /// A fresh, inactive session with no deadline pressure
    pub fn idle(now: Instant) -> Self {
        Self {
            id: SessionId::default(),
            phase: Phase::Idle,
            active: false,
            deadline: now,
        }
    }

    /// Start a new generation after `previous`
    pub fn start(previous: SessionId, now: Instant, timeout: Duration) -> Self {
        Self {
            id: SessionId(previous.0 + 1),
            phase: Phase::List,
            active: true,
            deadline: now + timeout,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.deadline
    }

    /// Move forward to `next`. Regressions and no-op moves are refused.
    pub fn advance(&mut self, next: Phase) -> bool {
        if !self.active || next <= self.phase {
            warn!(
                session = %self.id,
                from = %self.phase,
                to = %next,
                "refusing non-forward phase transition"
            );
            return false;
        }
        self.phase = next;
        true
    }

    /// Back to idle; the id is kept so late callbacks can still be matched against it
    pub fn stop(&mut self) {
        self.active = false;
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_sets_list_and_deadline() {
        let now = Instant::now();
        let session = Session::start(SessionId(3), now, Duration::from_secs(20));
        assert_eq!(session.id, SessionId(4));
        assert_eq!(session.phase, Phase::List);
        assert!(session.active);
        assert!(!session.is_expired(now + Duration::from_secs(20)));
        assert!(session.is_expired(now + Duration::from_millis(20_001)));
    }

    #[test]
    fn test_phase_only_moves_forward() {
        let now = Instant::now();
        let mut session = Session::start(SessionId::default(), now, Duration::from_secs(20));
        assert!(session.advance(Phase::Details));
        assert!(!session.advance(Phase::List));
        assert!(!session.advance(Phase::Details));
        assert_eq!(session.phase, Phase::Details);
        assert!(session.advance(Phase::Qr));
    }

    #[test]
    fn test_stopped_session_does_not_advance() {
        let now = Instant::now();
        let mut session = Session::start(SessionId::default(), now, Duration::from_secs(20));
        session.stop();
        assert_eq!(session.phase, Phase::Idle);
        assert!(!session.advance(Phase::Details));
        assert_eq!(session.phase, Phase::Idle);
    }
}
