// ── Domain model ──
//
// Canonical representation of a charger as the bridge sees it: the device
// record, the active session, and the characteristic values derived from
// them. Consumers (binary, host integrations) depend on these types only.

pub mod characteristic;
pub mod device;
pub mod session;

// ── Re-exports ──────────────────────────────────────────────────────
pub use characteristic::{Characteristic, CharacteristicUpdate, ContactState, LockState};
pub use device::DeviceSnapshot;
pub use session::{ChargeSession, SessionSnapshot};
