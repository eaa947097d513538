// ── Command API ──
//
// Typed mutation requests a consumer can hand to `Bridge::execute`.
// Every variant is routed through the bridge's `CommandQueue`.

pub mod queue;

pub use queue::{CommandQueue, TaskHandle};

use serde::Serialize;

use crate::model::{LockState, SessionSnapshot};

/// A user-facing operation on one charger or on the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Lock (disable) or unlock (enable) a charger.
    SetLock { address: String, locked: bool },
    /// Pause or resume the active session seen by a charger's accessory.
    SetPower { address: String, on: bool },
    /// Re-fetch the session and alive flag for one accessory.
    RefreshSession { address: String },
    /// Re-fetch the charger list.
    RefreshDevices,
}

/// Outcome of a successfully executed command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommandResult {
    Lock { address: String, state: LockState },
    Power { address: String, on: bool },
    Session { address: String, snapshot: SessionSnapshot },
    Devices { count: usize },
}
