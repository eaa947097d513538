// ── Charger accessory ──
//
// One accessory per charger address. Holds the latest device and session
// snapshots, derives the lock, power and contact characteristics from them,
// and turns user requests into queued API calls with optimistic updates.

mod revert;
mod state;

pub use revert::{RevertGuard, RevertState};
pub use state::AccessoryState;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use evbridge_api::{ApiClient, ChargerAction, SessionAction};
use tracing::{debug, error, info, warn};

use crate::command::{CommandQueue, TaskHandle};
use crate::error::CoreError;
use crate::host::AccessoryHost;
use crate::model::{CharacteristicUpdate, DeviceSnapshot, LockState, SessionSnapshot};

/// Handle to a charger accessory. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ChargerAccessory {
    inner: Arc<AccessoryInner>,
}

struct AccessoryInner {
    address: String,
    api: Arc<ApiClient>,
    queue: CommandQueue,
    host: Arc<dyn AccessoryHost>,
    device: ArcSwap<DeviceSnapshot>,
    session: ArcSwap<SessionSnapshot>,
    state: Mutex<AccessoryState>,
    /// Held across record and notify so the host sees values in the order
    /// they were recorded. Not reentrant.
    notify: Mutex<()>,
    revert: Mutex<RevertGuard>,
    revert_delay: Duration,
}

impl ChargerAccessory {
    /// Create an accessory for `device`. Nothing is reported to the host
    /// until the first reconciliation.
    pub fn new(
        device: DeviceSnapshot,
        api: Arc<ApiClient>,
        queue: CommandQueue,
        host: Arc<dyn AccessoryHost>,
        revert_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(AccessoryInner {
                address: device.address.clone(),
                api,
                queue,
                host,
                device: ArcSwap::from_pointee(device),
                session: ArcSwap::from_pointee(SessionSnapshot::default()),
                state: Mutex::new(AccessoryState::default()),
                notify: Mutex::new(()),
                revert: Mutex::new(RevertGuard::default()),
                revert_delay,
            }),
        }
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn address(&self) -> &str {
        &self.inner.address
    }

    pub fn device(&self) -> Arc<DeviceSnapshot> {
        self.inner.device.load_full()
    }

    pub fn session(&self) -> Arc<SessionSnapshot> {
        self.inner.session.load_full()
    }

    /// Values last reported to the host.
    pub fn state(&self) -> AccessoryState {
        *self.lock_state()
    }

    pub fn revert_state(&self) -> RevertState {
        self.lock_revert().state()
    }

    // ── Inbound refreshes ────────────────────────────────────────

    /// Replace the device snapshot and reconcile, inside the queue.
    pub async fn update_device(&self, device: DeviceSnapshot) -> Result<(), CoreError> {
        if device.address != self.inner.address {
            return Err(CoreError::ValidationFailed {
                message: format!(
                    "snapshot for {} handed to accessory {}",
                    device.address, self.inner.address
                ),
            });
        }
        let this = self.clone();
        self.inner
            .queue
            .enqueue(async move { this.apply_device(device) })
            .await
    }

    /// Queue a session check without waiting for it.
    pub fn submit_session_check(
        &self,
    ) -> Result<TaskHandle<Result<SessionSnapshot, CoreError>>, CoreError> {
        let this = self.clone();
        self.inner
            .queue
            .submit(async move { this.refresh_session().await })
    }

    /// Fetch the active session and alive flag, then reconcile.
    ///
    /// On fetch failure the previous snapshot stays in place and the error
    /// is returned; characteristics are left untouched.
    pub async fn check_session(&self) -> Result<SessionSnapshot, CoreError> {
        self.submit_session_check()?.wait().await?
    }

    fn apply_device(&self, device: DeviceSnapshot) {
        debug!(
            address = %self.inner.address,
            is_disabled = device.is_disabled,
            "device snapshot updated"
        );
        self.inner.device.store(Arc::new(device));
        self.reconcile();
    }

    async fn refresh_session(&self) -> Result<SessionSnapshot, CoreError> {
        let address = &self.inner.address;
        let session = match self.inner.api.fetch_active_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(address = %address, error = %e, "session fetch failed");
                return Err(e.into());
            }
        };
        let alive = self.inner.api.is_session_alive().await;

        let snapshot = SessionSnapshot {
            session: session.map(Into::into),
            alive,
        };
        debug!(
            address = %address,
            alive,
            power_on = snapshot.power_on(),
            "session refreshed"
        );
        self.inner.session.store(Arc::new(snapshot.clone()));
        self.reconcile();
        Ok(snapshot)
    }

    /// Recompute all characteristics from the current snapshots.
    pub fn reconcile(&self) {
        let device = self.inner.device.load();
        let session = self.inner.session.load();

        let lock = device.lock_state();
        self.emit(CharacteristicUpdate::LockCurrent(lock), false);
        // Target mirrors current on every pass.
        self.emit(CharacteristicUpdate::LockTarget(lock), true);

        if session.alive {
            self.lock_revert().clear();
        }
        self.emit(CharacteristicUpdate::PowerOn(session.power_on()), false);
        self.emit(CharacteristicUpdate::Contact(session.contact()), false);
    }

    // ── User requests ────────────────────────────────────────────

    /// Lock or unlock the charger.
    ///
    /// The target is reported immediately. If the API call fails the
    /// current state becomes `Unknown` and the error is returned.
    pub async fn set_lock_target(&self, target: LockState) -> Result<(), CoreError> {
        let Some(locked) = target.locked() else {
            return Err(CoreError::ValidationFailed {
                message: "lock target must be secured or unsecured".into(),
            });
        };

        let state = self.state();
        if state.lock_target == Some(target) && state.lock_current == Some(target) {
            debug!(address = %self.inner.address, %target, "lock already in requested state");
            return Ok(());
        }

        self.emit(CharacteristicUpdate::LockTarget(target), false);

        let this = self.clone();
        self.inner
            .queue
            .enqueue(async move { this.apply_lock(locked).await })
            .await?
    }

    async fn apply_lock(&self, locked: bool) -> Result<(), CoreError> {
        let address = &self.inner.address;
        let action = ChargerAction::for_locked(locked);

        match self.inner.api.apply_charger_action(address, action).await {
            Ok(()) => {
                let device = self.inner.device.load().with_locked(locked);
                self.inner.device.store(Arc::new(device));
                self.emit(
                    CharacteristicUpdate::LockCurrent(LockState::from_locked(locked)),
                    false,
                );
                info!(address = %address, %action, "charger lock applied");
                Ok(())
            }
            Err(e) => {
                error!(address = %address, %action, error = %e, "charger lock failed");
                self.emit(CharacteristicUpdate::LockCurrent(LockState::Unknown), false);
                Err(e.into())
            }
        }
    }

    /// Pause or resume charging.
    ///
    /// Rejected while no vehicle is connected; power is then forced back off
    /// after the revert delay. Otherwise the value is reported immediately
    /// and kept even if the API call fails.
    pub async fn set_power_on(&self, on: bool) -> Result<(), CoreError> {
        let address = &self.inner.address;

        if self.lock_revert().take_reentry(on) {
            debug!(address = %address, "ignoring echo of forced power off");
            return Ok(());
        }

        if !self.inner.session.load().alive {
            warn!(
                address = %address,
                requested = on,
                "no vehicle connected, rejecting power change"
            );
            self.schedule_revert();
            return Err(CoreError::Rejected {
                message: format!("no vehicle connected to charger {address}"),
            });
        }

        self.lock_revert().cancel();
        self.emit(CharacteristicUpdate::PowerOn(on), false);

        let this = self.clone();
        self.inner
            .queue
            .enqueue(async move { this.apply_power(on).await })
            .await?
    }

    async fn apply_power(&self, on: bool) -> Result<(), CoreError> {
        let address = &self.inner.address;
        let action = SessionAction::for_power(on);

        match self.inner.api.apply_session_action(action).await {
            Ok(()) => {
                let session = self.inner.session.load().with_paused(!on);
                self.inner.session.store(Arc::new(session));
                info!(address = %address, %action, "session action applied");
                Ok(())
            }
            Err(e) => {
                // Not rolled back; the next poll restores the real value.
                error!(address = %address, %action, error = %e, "session action failed");
                Err(e.into())
            }
        }
    }

    fn schedule_revert(&self) {
        let (generation, token) = self.lock_revert().schedule();
        let delay = self.inner.revert_delay;
        let this = self.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    if this.lock_revert().fire(generation) {
                        debug!(address = %this.inner.address, "forcing power off");
                        this.emit(CharacteristicUpdate::PowerOn(false), true);
                    }
                }
            }
        });
    }

    /// Disarm timers. Called when the charger disappears or the bridge stops.
    pub fn shutdown(&self) {
        self.lock_revert().clear();
    }

    // ── Internals ────────────────────────────────────────────────

    fn emit(&self, update: CharacteristicUpdate, forced: bool) {
        let _order = self
            .inner
            .notify
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let changed = self.lock_state().record(update, forced);
        if !changed {
            return;
        }
        debug!(
            address = %self.inner.address,
            characteristic = %update.characteristic(),
            value = %update.value_label(),
            forced,
            "characteristic changed"
        );
        self.inner
            .host
            .characteristic_changed(&self.inner.address, update);
    }

    fn lock_state(&self) -> MutexGuard<'_, AccessoryState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_revert(&self) -> MutexGuard<'_, RevertGuard> {
        self.inner
            .revert
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ChargerAccessory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargerAccessory")
            .field("address", &self.inner.address)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
