// ── Host collaborator ──
//
// The smart-home host receives characteristic changes through this trait.
// Notifications for one accessory are delivered one at a time, in the
// order the values were recorded.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::model::CharacteristicUpdate;

/// Receiver of characteristic notifications from accessories.
///
/// Called with the accessory's notify lock held. Implementations must not
/// synchronously call a `set_*` method of the same accessory; hand the
/// request off to a task instead. Reading `state()` is fine.
pub trait AccessoryHost: Send + Sync {
    fn characteristic_changed(&self, address: &str, update: CharacteristicUpdate);
}

/// One characteristic change, as fanned out by [`BroadcastHost`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacteristicEvent {
    pub address: String,
    #[serde(flatten)]
    pub update: CharacteristicUpdate,
}

/// Host that republishes every update on a broadcast channel.
///
/// Slow subscribers lag and miss events; accessories keep running.
#[derive(Debug, Clone)]
pub struct BroadcastHost {
    tx: broadcast::Sender<CharacteristicEvent>,
}

impl BroadcastHost {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CharacteristicEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastHost {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl AccessoryHost for BroadcastHost {
    fn characteristic_changed(&self, address: &str, update: CharacteristicUpdate) {
        let event = CharacteristicEvent {
            address: address.to_owned(),
            update,
        };
        // No subscribers is fine.
        if self.tx.send(event).is_err() {
            trace!(address, "characteristic change with no subscribers");
        }
    }
}

/// Host that drops every update. Used by one-shot CLI invocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHost;

impl AccessoryHost for NullHost {
    fn characteristic_changed(&self, _address: &str, _update: CharacteristicUpdate) {}
}
