// ── Device domain types ──

use serde::Serialize;
use serde_json::{Map, Value};

use super::characteristic::LockState;

/// A charger record as last reported by the cloud.
///
/// Immutable: a refresh replaces the whole value. `address` is the stable
/// identity and never changes for an accessory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub address: String,
    /// `1` means disabled (locked).
    pub is_disabled: i64,
    pub charger_model: Option<String>,
    pub charger_address: Option<String>,
    pub hub_address: Option<String>,
    /// Fields the bridge does not interpret.
    pub extra: Map<String, Value>,
}

impl DeviceSnapshot {
    /// Minimal snapshot, mostly useful for tests and host-provided records.
    pub fn new(address: impl Into<String>, is_disabled: i64) -> Self {
        Self {
            address: address.into(),
            is_disabled,
            charger_model: None,
            charger_address: None,
            hub_address: None,
            extra: Map::new(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.is_disabled == 1
    }

    pub fn lock_state(&self) -> LockState {
        LockState::from_locked(self.is_locked())
    }

    /// Copy of this snapshot after a confirmed enable/disable.
    pub fn with_locked(&self, locked: bool) -> Self {
        Self {
            is_disabled: i64::from(locked),
            ..self.clone()
        }
    }

    /// Display name: model plus address when the model is known.
    pub fn display_name(&self) -> String {
        match &self.charger_model {
            Some(model) => format!("{model} {}", self.address),
            None => self.address.clone(),
        }
    }
}
