// ── Runtime bridge configuration ──
//
// These types describe *how* to talk to the charger cloud and how often to
// poll it. They carry credential data and tuning, but never touch disk.
// The binary (via evbridge-config) constructs a `BridgeConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store.
    #[default]
    SystemDefaults,
    /// Additional CA certificate file.
    CustomCa(PathBuf),
}

/// Configuration for one charger-cloud account.
///
/// Built by the binary, passed to `Bridge` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// API root (e.g., `https://api.example.com`).
    pub api_url: Url,
    pub username: String,
    pub password: SecretString,
    pub tls: TlsVerification,
    /// Upper bound for every HTTP request. A stalled request would
    /// otherwise hold the command queue forever.
    pub timeout: Duration,
    /// Session poll cadence. `Duration::ZERO` disables the poller.
    pub poll_interval: Duration,
    /// Refresh the charger list every N poll ticks. 0 = never.
    pub device_refresh_every: u32,
    /// How long a rejected power command waits before forcing power off.
    pub revert_delay: Duration,
}

impl BridgeConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
    pub const DEFAULT_DEVICE_REFRESH_EVERY: u32 = 10;
    pub const DEFAULT_REVERT_DELAY: Duration = Duration::from_secs(1);

    /// Config with default tuning.
    pub fn new(api_url: Url, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            api_url,
            username: username.into(),
            password,
            tls: TlsVerification::default(),
            timeout: Self::DEFAULT_TIMEOUT,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            device_refresh_every: Self::DEFAULT_DEVICE_REFRESH_EVERY,
            revert_delay: Self::DEFAULT_REVERT_DELAY,
        }
    }
}
