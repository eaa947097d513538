// ── API-to-domain type conversions ──
//
// Bridges raw `evbridge_api` response types into canonical
// `evbridge_core::model` domain types.

use evbridge_api::{Charger, Session};

use crate::model::{ChargeSession, DeviceSnapshot};

impl From<Charger> for DeviceSnapshot {
    fn from(c: Charger) -> Self {
        Self {
            address: c.address,
            is_disabled: c.is_disabled,
            charger_model: c.charger_model,
            charger_address: c.charger_address,
            hub_address: c.hub_address,
            extra: c.extra,
        }
    }
}

impl From<Session> for ChargeSession {
    fn from(s: Session) -> Self {
        Self {
            is_paused: s.is_paused,
            is_overridden: s.is_overridden,
            telemetry: s.telemetry,
        }
    }
}
