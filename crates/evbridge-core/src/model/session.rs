// ── Charging session domain types ──

use serde::Serialize;
use serde_json::{Map, Value};

use super::characteristic::ContactState;

/// The active charging session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeSession {
    pub is_paused: bool,
    pub is_overridden: bool,
    pub telemetry: Map<String, Value>,
}

/// What the bridge last learned about the session side of a charger:
/// the session record (if any) and the independently fetched alive flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session: Option<ChargeSession>,
    /// A vehicle is connected. Not derivable from `session`.
    pub alive: bool,
}

impl SessionSnapshot {
    /// Power is on while a session exists and is not paused.
    pub fn power_on(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_paused)
    }

    pub fn contact(&self) -> ContactState {
        ContactState::from_alive(self.alive)
    }

    /// Copy reflecting a confirmed pause/resume. A missing session stays
    /// missing; the next poll brings the real record.
    pub fn with_paused(&self, paused: bool) -> Self {
        let mut next = self.clone();
        if let Some(session) = next.session.as_mut() {
            session.is_paused = paused;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(paused: bool) -> ChargeSession {
        ChargeSession {
            is_paused: paused,
            is_overridden: false,
            telemetry: Map::new(),
        }
    }

    #[test]
    fn power_requires_unpaused_session() {
        let none = SessionSnapshot::default();
        assert!(!none.power_on());

        let paused = SessionSnapshot {
            session: Some(session(true)),
            alive: true,
        };
        assert!(!paused.power_on());
        assert!(paused.with_paused(false).power_on());
    }

    #[test]
    fn contact_follows_alive() {
        let snap = SessionSnapshot {
            session: None,
            alive: true,
        };
        assert_eq!(snap.contact(), ContactState::Detected);
        assert_eq!(SessionSnapshot::default().contact(), ContactState::NotDetected);
    }
}
