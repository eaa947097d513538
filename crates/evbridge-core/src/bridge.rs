// ── Bridge facade ──
//
// Ties one charger-cloud account to its accessories: discovers chargers,
// keeps one `ChargerAccessory` per address, runs the poller, and routes
// user commands. All remote calls go through the shared `CommandQueue`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use evbridge_api::{
    ApiClient, ChargerStatus, Credentials, SessionAction, TlsMode, TransportConfig, VehicleInfo,
};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::accessory::ChargerAccessory;
use crate::command::{Command, CommandQueue, CommandResult};
use crate::config::{BridgeConfig, TlsVerification};
use crate::error::CoreError;
use crate::host::AccessoryHost;
use crate::model::{DeviceSnapshot, LockState, SessionSnapshot};
use crate::poller::{self, PollOutcome};

/// Lifecycle of a [`Bridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BridgeState {
    Stopped,
    Starting,
    Running,
    Failed,
}

/// Main entry point for consumers.
///
/// Cheaply cloneable via `Arc<BridgeInner>`.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    api: Arc<ApiClient>,
    queue: CommandQueue,
    host: Arc<dyn AccessoryHost>,
    accessories: DashMap<String, ChargerAccessory>,
    state: watch::Sender<BridgeState>,
    last_poll: watch::Sender<Option<DateTime<Utc>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Bridge {
    /// Build the API client from `config` and create a stopped bridge.
    /// Must be called inside a Tokio runtime.
    pub fn new(config: BridgeConfig, host: Arc<dyn AccessoryHost>) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            tls: match &config.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            },
            timeout: config.timeout,
        };
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let api = ApiClient::new(config.api_url.clone(), credentials, &transport)?;
        Ok(Self::with_api(config, Arc::new(api), host))
    }

    /// Create a bridge around an existing client.
    pub fn with_api(
        config: BridgeConfig,
        api: Arc<ApiClient>,
        host: Arc<dyn AccessoryHost>,
    ) -> Self {
        let (state, _) = watch::channel(BridgeState::Stopped);
        let (last_poll, _) = watch::channel(None);

        Self {
            inner: Arc::new(BridgeInner {
                config,
                api,
                queue: CommandQueue::new(),
                host,
                accessories: DashMap::new(),
                state,
                last_poll,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.inner.api
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.inner.queue
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Discover chargers, run an initial session check for each, and spawn
    /// the poller (unless `poll_interval` is zero).
    pub async fn start(&self) -> Result<(), CoreError> {
        self.inner.state.send_replace(BridgeState::Starting);

        let count = match self.refresh_devices().await {
            Ok(count) => count,
            Err(e) => {
                self.inner.state.send_replace(BridgeState::Failed);
                return Err(e);
            }
        };
        info!(chargers = count, "chargers discovered");

        // Session checks are best effort; a failure leaves the accessory
        // with default characteristics until the next poll.
        match poller::poll_once(self, false).await {
            Ok(outcome) => debug!(?outcome, "initial session check"),
            Err(e) => warn!(error = %e, "initial session check failed"),
        }

        let interval = self.inner.config.poll_interval;
        if !interval.is_zero() {
            let handle = tokio::spawn(poller::poll_task(
                self.clone(),
                interval,
                self.inner.config.device_refresh_every,
                self.inner.cancel.child_token(),
            ));
            self.inner.task_handles.lock().await.push(handle);
            debug!(interval_secs = interval.as_secs(), "poller spawned");
        }

        self.inner.state.send_replace(BridgeState::Running);
        Ok(())
    }

    /// Stop background tasks and the command queue.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        for entry in &self.inner.accessories {
            entry.value().shutdown();
        }
        self.inner.queue.shutdown().await;

        self.inner.state.send_replace(BridgeState::Stopped);
        debug!("bridge stopped");
    }

    /// One-shot: start without a poller, run `f`, shut down.
    pub async fn oneshot<F, Fut, T>(
        config: BridgeConfig,
        host: Arc<dyn AccessoryHost>,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Bridge) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.poll_interval = std::time::Duration::ZERO;

        let bridge = Bridge::new(cfg, host)?;
        if let Err(e) = bridge.start().await {
            bridge.shutdown().await;
            return Err(e);
        }
        let result = f(bridge.clone()).await;
        bridge.shutdown().await;
        result
    }

    // ── State observation ────────────────────────────────────────

    pub fn state(&self) -> watch::Receiver<BridgeState> {
        self.inner.state.subscribe()
    }

    /// Completion time of the latest full poll pass.
    pub fn last_poll(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.inner.last_poll.subscribe()
    }

    pub(crate) fn record_poll(&self) {
        self.inner.last_poll.send_replace(Some(Utc::now()));
    }

    pub fn accessory(&self, address: &str) -> Option<ChargerAccessory> {
        self.inner
            .accessories
            .get(address)
            .map(|entry| entry.value().clone())
    }

    /// All accessories, ordered by address.
    pub fn accessories(&self) -> Vec<ChargerAccessory> {
        let mut all: Vec<_> = self
            .inner
            .accessories
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.address().cmp(b.address()));
        all
    }

    fn require_accessory(&self, address: &str) -> Result<ChargerAccessory, CoreError> {
        self.accessory(address)
            .ok_or_else(|| CoreError::ChargerNotFound {
                address: address.to_owned(),
            })
    }

    // ── Device discovery ─────────────────────────────────────────

    /// Fetch the charger list and apply it. Returns the charger count.
    pub async fn refresh_devices(&self) -> Result<usize, CoreError> {
        let api = Arc::clone(&self.inner.api);
        let chargers = self
            .inner
            .queue
            .enqueue(async move { api.list_chargers().await })
            .await??;

        let snapshots = chargers.into_iter().map(DeviceSnapshot::from).collect();
        self.apply_device_snapshots(snapshots).await
    }

    /// Add, update, or remove accessories to match `snapshots`.
    pub async fn apply_device_snapshots(
        &self,
        snapshots: Vec<DeviceSnapshot>,
    ) -> Result<usize, CoreError> {
        let mut seen = HashSet::with_capacity(snapshots.len());

        for snapshot in snapshots {
            if !seen.insert(snapshot.address.clone()) {
                warn!(address = %snapshot.address, "duplicate charger in list, keeping first");
                continue;
            }

            let accessory = match self.accessory(&snapshot.address) {
                Some(existing) => existing,
                None => {
                    info!(
                        address = %snapshot.address,
                        name = %snapshot.display_name(),
                        "charger added"
                    );
                    let created = ChargerAccessory::new(
                        snapshot.clone(),
                        Arc::clone(&self.inner.api),
                        self.inner.queue.clone(),
                        Arc::clone(&self.inner.host),
                        self.inner.config.revert_delay,
                    );
                    self.inner
                        .accessories
                        .insert(snapshot.address.clone(), created.clone());
                    created
                }
            };
            accessory.update_device(snapshot).await?;
        }

        let gone: Vec<String> = self
            .inner
            .accessories
            .iter()
            .filter(|entry| !seen.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        for address in gone {
            if let Some((_, accessory)) = self.inner.accessories.remove(&address) {
                accessory.shutdown();
                info!(address = %address, "charger removed");
            }
        }

        Ok(seen.len())
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Execute a command against one accessory or the account.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        match cmd {
            Command::SetLock { address, locked } => {
                let accessory = self.require_accessory(&address)?;
                let state = LockState::from_locked(locked);
                accessory.set_lock_target(state).await?;
                Ok(CommandResult::Lock { address, state })
            }
            Command::SetPower { address, on } => {
                let accessory = self.require_accessory(&address)?;
                accessory.set_power_on(on).await?;
                Ok(CommandResult::Power { address, on })
            }
            Command::RefreshSession { address } => {
                let accessory = self.require_accessory(&address)?;
                let snapshot = accessory.check_session().await?;
                Ok(CommandResult::Session { address, snapshot })
            }
            Command::RefreshDevices => {
                let count = self.refresh_devices().await?;
                Ok(CommandResult::Devices { count })
            }
        }
    }

    /// Run one poll pass now.
    pub async fn poll_now(&self) -> Result<PollOutcome, CoreError> {
        poller::poll_once(self, false).await
    }

    // ── Ad-hoc queries (queued) ──────────────────────────────────

    /// Hub and charger reachability for one charger.
    pub async fn charger_status(&self, address: &str) -> Result<ChargerStatus, CoreError> {
        let api = Arc::clone(&self.inner.api);
        let address = address.to_owned();
        Ok(self
            .inner
            .queue
            .enqueue(async move { api.charger_status(&address).await })
            .await??)
    }

    /// Vehicle attached to the account.
    pub async fn vehicle_info(&self) -> Result<VehicleInfo, CoreError> {
        let api = Arc::clone(&self.inner.api);
        Ok(self
            .inner
            .queue
            .enqueue(async move { api.vehicle_info().await })
            .await??)
    }

    /// Active session and alive flag, without touching any accessory.
    pub async fn active_session(&self) -> Result<SessionSnapshot, CoreError> {
        let api = Arc::clone(&self.inner.api);
        self.inner
            .queue
            .enqueue(async move {
                let session = api.fetch_active_session().await?;
                let alive = api.is_session_alive().await;
                Ok::<_, CoreError>(SessionSnapshot {
                    session: session.map(Into::into),
                    alive,
                })
            })
            .await?
    }

    /// Pause or resume the account's session directly, bypassing the
    /// accessory alive guard.
    pub async fn apply_session_action(&self, action: SessionAction) -> Result<(), CoreError> {
        let api = Arc::clone(&self.inner.api);
        Ok(self
            .inner
            .queue
            .enqueue(async move { api.apply_session_action(action).await })
            .await??)
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("accessories", &self.inner.accessories.len())
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}
