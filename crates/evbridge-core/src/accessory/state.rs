// ── Last-emitted characteristic values ──

use serde::Serialize;

use crate::model::{CharacteristicUpdate, ContactState, LockState};

/// The values most recently reported to the host, one slot per
/// characteristic. `None` means nothing has been reported yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccessoryState {
    pub lock_current: Option<LockState>,
    pub lock_target: Option<LockState>,
    pub power_on: Option<bool>,
    pub contact: Option<ContactState>,
}

impl AccessoryState {
    /// Store `update` and decide whether the host should hear about it:
    /// only when the value differs from the last one, or when `forced`.
    pub fn record(&mut self, update: CharacteristicUpdate, forced: bool) -> bool {
        let changed = match update {
            CharacteristicUpdate::LockCurrent(v) => replace(&mut self.lock_current, v),
            CharacteristicUpdate::LockTarget(v) => replace(&mut self.lock_target, v),
            CharacteristicUpdate::PowerOn(v) => replace(&mut self.power_on, v),
            CharacteristicUpdate::Contact(v) => replace(&mut self.contact, v),
        };
        changed || forced
    }
}

fn replace<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    if slot.as_ref() == Some(&value) {
        return false;
    }
    *slot = Some(value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_value_is_suppressed() {
        let mut state = AccessoryState::default();
        assert!(state.record(CharacteristicUpdate::PowerOn(false), false));
        assert!(!state.record(CharacteristicUpdate::PowerOn(false), false));
        assert!(state.record(CharacteristicUpdate::PowerOn(true), false));
    }

    #[test]
    fn forced_always_emits() {
        let mut state = AccessoryState::default();
        let target = CharacteristicUpdate::LockTarget(LockState::Secured);
        assert!(state.record(target, true));
        assert!(state.record(target, true));
        assert_eq!(state.lock_target, Some(LockState::Secured));
    }

    #[test]
    fn axes_are_independent() {
        let mut state = AccessoryState::default();
        state.record(CharacteristicUpdate::LockCurrent(LockState::Unsecured), false);
        assert!(state.record(CharacteristicUpdate::LockTarget(LockState::Unsecured), false));
        assert!(state.record(CharacteristicUpdate::Contact(ContactState::Detected), false));
        assert_eq!(state.power_on, None);
    }
}
