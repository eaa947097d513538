// ── Power revert guard ──
//
// When a power-on request arrives while no vehicle is connected, the
// accessory forces power back off after a short delay. The host echoes that
// forced value as a new set request; the guard swallows exactly that one.
//
//   Idle ──schedule──▶ (timer armed) ──fire──▶ PendingRevert
//     ▲                     │                        │
//     └──────cancel─────────┘        take_reentry ───┘ (back to Idle)

use serde::Serialize;
use strum::Display;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RevertState {
    #[default]
    Idle,
    /// The forced off was emitted; the next set request is its echo.
    PendingRevert,
}

#[derive(Debug, Default)]
pub struct RevertGuard {
    state: RevertState,
    timer: Option<CancellationToken>,
    generation: u64,
}

impl RevertGuard {
    pub fn state(&self) -> RevertState {
        self.state
    }

    /// Arm a new revert timer, cancelling any earlier one. Returns the
    /// generation to pass to [`fire`](Self::fire) and the token the timer
    /// task should watch.
    pub fn schedule(&mut self) -> (u64, CancellationToken) {
        self.cancel();
        self.generation += 1;
        let token = CancellationToken::new();
        self.timer = Some(token.clone());
        (self.generation, token)
    }

    /// Timer elapsed. Returns `true` if the revert should be emitted, i.e.
    /// this timer was not superseded or cancelled in the meantime.
    pub fn fire(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.timer.is_none() {
            return false;
        }
        self.timer = None;
        self.state = RevertState::PendingRevert;
        true
    }

    /// Disarm the timer without touching the state.
    pub fn cancel(&mut self) {
        if let Some(token) = self.timer.take() {
            token.cancel();
        }
    }

    /// Consume the pending revert for an incoming set request. Returns
    /// `true` if the request is the echo of the forced off and must be
    /// ignored.
    pub fn take_reentry(&mut self, requested_on: bool) -> bool {
        if self.state != RevertState::PendingRevert {
            return false;
        }
        self.state = RevertState::Idle;
        !requested_on
    }

    /// Back to idle, timer disarmed.
    pub fn clear(&mut self) {
        self.cancel();
        self.state = RevertState::Idle;
    }
}
