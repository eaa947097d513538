// Charger ("mini") endpoints
//
// List, status, and enable/disable. Enable and disable share one code path
// selected by `ChargerAction`.

use strum::{AsRefStr, Display};
use tracing::{debug, warn};

use crate::client::{ApiClient, RequestOptions};
use crate::error::Error;
use crate::models::{Charger, ChargerStatus};

/// Lock-axis command against a charger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ChargerAction {
    /// Allow charging (unlock).
    Enable,
    /// Block charging (lock).
    Disable,
}

impl ChargerAction {
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Enable => "/api/mini/enable",
            Self::Disable => "/api/mini/disable",
        }
    }

    /// The action that brings a charger to the requested lock state.
    pub fn for_locked(locked: bool) -> Self {
        if locked { Self::Disable } else { Self::Enable }
    }
}

impl ApiClient {
    /// List all chargers on the account.
    pub async fn list_chargers(&self) -> Result<Vec<Charger>, Error> {
        let chargers: Vec<Charger> = self
            .get_json("/api/mini/list", RequestOptions::new())
            .await?;
        debug!(count = chargers.len(), "listed chargers");
        Ok(chargers)
    }

    /// Fetch the connectivity status of one charger.
    ///
    /// Fails with [`Error::Connectivity`] unless both the hub and the
    /// charger report a 2xx-style code.
    pub async fn charger_status(&self, address: &str) -> Result<ChargerStatus, Error> {
        let status: ChargerStatus = self
            .get_json(
                "/api/mini/status",
                RequestOptions::new().query("address", address),
            )
            .await?;

        if !status.is_reachable() {
            warn!(
                address,
                hub = %status.hub_code(),
                charger = %status.charger_code(),
                "charger not reachable"
            );
            return Err(Error::Connectivity {
                address: address.to_owned(),
                hub: status.hub_code(),
                charger: status.charger_code(),
            });
        }

        Ok(status)
    }

    /// Send an enable/disable command for `address`.
    pub async fn apply_charger_action(
        &self,
        address: &str,
        action: ChargerAction,
    ) -> Result<(), Error> {
        debug!(address, %action, "charger command");
        self.post_command(action.endpoint(), RequestOptions::new().form_field("id", address))
            .await
    }

    pub async fn enable_charger(&self, address: &str) -> Result<(), Error> {
        self.apply_charger_action(address, ChargerAction::Enable)
            .await
    }

    pub async fn disable_charger(&self, address: &str) -> Result<(), Error> {
        self.apply_charger_action(address, ChargerAction::Disable)
            .await
    }
}
