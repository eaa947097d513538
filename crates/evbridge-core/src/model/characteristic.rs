// ── Characteristic values ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lock characteristic value. `Unknown` is only ever a *current* state,
/// reported when an enable/disable command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Unsecured,
    Secured,
    Unknown,
}

impl LockState {
    pub fn from_locked(locked: bool) -> Self {
        if locked { Self::Secured } else { Self::Unsecured }
    }

    /// `Some(true)` for secured, `Some(false)` for unsecured.
    pub fn locked(self) -> Option<bool> {
        match self {
            Self::Secured => Some(true),
            Self::Unsecured => Some(false),
            Self::Unknown => None,
        }
    }
}

/// Contact sensor value: whether a vehicle is plugged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContactState {
    Detected,
    NotDetected,
}

impl ContactState {
    pub fn from_alive(alive: bool) -> Self {
        if alive { Self::Detected } else { Self::NotDetected }
    }
}

/// Which characteristic an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Characteristic {
    LockCurrent,
    LockTarget,
    PowerOn,
    Contact,
}

/// A characteristic value reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "characteristic", content = "value", rename_all = "snake_case")]
pub enum CharacteristicUpdate {
    LockCurrent(LockState),
    LockTarget(LockState),
    PowerOn(bool),
    Contact(ContactState),
}

impl CharacteristicUpdate {
    pub fn characteristic(&self) -> Characteristic {
        match self {
            Self::LockCurrent(_) => Characteristic::LockCurrent,
            Self::LockTarget(_) => Characteristic::LockTarget,
            Self::PowerOn(_) => Characteristic::PowerOn,
            Self::Contact(_) => Characteristic::Contact,
        }
    }

    /// Human-readable value for logs.
    pub fn value_label(&self) -> String {
        match self {
            Self::LockCurrent(v) | Self::LockTarget(v) => v.to_string(),
            Self::PowerOn(on) => if *on { "on" } else { "off" }.to_owned(),
            Self::Contact(c) => c.to_string(),
        }
    }
}
