//! Configuration for the evbridge binary.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation to `evbridge_core::BridgeConfig`. Core never reads files;
//! everything on disk is handled here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use evbridge_core::{BridgeConfig, TlsVerification};

/// Env var consulted for the password before the keyring.
pub const PASSWORD_ENV: &str = "EVBRIDGE_PASSWORD";
/// Env var consulted when a profile has no username.
pub const USERNAME_ENV: &str = "EVBRIDGE_USERNAME";

const KEYRING_SERVICE: &str = "evbridge";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// `name`, else the configured default profile, else `"default"`.
    pub fn profile_name(&self, name: Option<&str>) -> String {
        name.or(self.default_profile.as_deref())
            .unwrap_or("default")
            .to_owned()
    }

    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = self.profile_name(name);
        match self.profiles.get(&name) {
            Some(profile) => Ok((name, profile)),
            None => Err(ConfigError::ProfileNotFound { name }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Session poll interval in seconds. 0 disables polling.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Refresh the charger list every N polls. 0 = never.
    #[serde(default = "default_device_refresh_every")]
    pub device_refresh_every: u32,

    #[serde(default = "default_revert_delay_ms")]
    pub revert_delay_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            device_refresh_every: default_device_refresh_every(),
            revert_delay_ms: default_revert_delay_ms(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    BridgeConfig::DEFAULT_TIMEOUT.as_secs()
}
fn default_poll_interval() -> u64 {
    BridgeConfig::DEFAULT_POLL_INTERVAL.as_secs()
}
fn default_device_refresh_every() -> u32 {
    BridgeConfig::DEFAULT_DEVICE_REFRESH_EVERY
}
fn default_revert_delay_ms() -> u64 {
    1000
}

/// A named charger-cloud account.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// API root (e.g., "https://api.example.com").
    pub api_url: String,

    /// Account username (usually an email address).
    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the password, checked first.
    pub password_env: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    pub timeout: Option<u64>,
    pub poll_interval: Option<u64>,
    pub device_refresh_every: Option<u32>,
    pub revert_delay_ms: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "evbridge", "evbridge").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("evbridge");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. Missing files fall back to defaults;
/// `EVBRIDGE_` env vars (nested with `__`) override both.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("EVBRIDGE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the account username: profile first, then `EVBRIDGE_USERNAME`.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .or_else(|| std::env::var(USERNAME_ENV).ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the password: profile's `password_env`, `EVBRIDGE_PASSWORD`,
/// system keyring, then plaintext in the profile.
pub fn resolve_password(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Well-known env var
    if let Ok(val) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(val));
    }

    // 3. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name)) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a password in the system keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    entry.set_password(password)?;
    Ok(())
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `BridgeConfig` from a profile, falling back to `defaults` for
/// unset tuning fields.
pub fn profile_to_bridge_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<BridgeConfig, ConfigError> {
    let api_url: url::Url = profile
        .api_url
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("invalid URL: {}", profile.api_url),
        })?;

    let username = resolve_username(profile, profile_name)?;
    let password = resolve_password(profile, profile_name)?;

    let mut config = BridgeConfig::new(api_url, username, password);
    config.tls = profile
        .ca_cert
        .clone()
        .map_or(TlsVerification::SystemDefaults, TlsVerification::CustomCa);

    let timeout = profile.timeout.unwrap_or(defaults.timeout);
    if timeout == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }
    config.timeout = Duration::from_secs(timeout);
    config.poll_interval =
        Duration::from_secs(profile.poll_interval.unwrap_or(defaults.poll_interval));
    config.device_refresh_every = profile
        .device_refresh_every
        .unwrap_or(defaults.device_refresh_every);
    config.revert_delay =
        Duration::from_millis(profile.revert_delay_ms.unwrap_or(defaults.revert_delay_ms));

    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn profile() -> Profile {
        Profile {
            api_url: "https://api.example.com".into(),
            username: Some("driver@example.com".into()),
            password: Some("plaintext".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert_eq!(config.defaults.timeout, 15);
        assert_eq!(config.defaults.poll_interval, 30);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn file_profiles_and_defaults_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "home"

[defaults]
poll_interval = 60

[profiles.home]
api_url = "https://api.example.com"
username = "driver@example.com"
revert_delay_ms = 250
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        let (name, home) = config.profile(None).unwrap();

        assert_eq!(name, "home");
        assert_eq!(config.defaults.poll_interval, 60);
        assert_eq!(config.defaults.timeout, 15);
        assert_eq!(home.revert_delay_ms, Some(250));
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.profiles.insert("default".into(), profile());

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        let (_, p) = loaded.profile(None).unwrap();
        assert_eq!(p.api_url, "https://api.example.com");
        assert_eq!(p.username.as_deref(), Some("driver@example.com"));
    }

    #[test]
    fn unknown_profile_is_reported() {
        let err = Config::default().profile(Some("nope")).unwrap_err();
        assert!(matches!(err, ConfigError::ProfileNotFound { ref name } if name == "nope"));
    }

    #[test]
    fn profile_overrides_defaults() {
        let mut p = profile();
        p.poll_interval = Some(5);
        p.ca_cert = Some(PathBuf::from("/etc/ssl/cloud.pem"));

        let config =
            profile_to_bridge_config(&p, "evbridge-test-overrides", &Defaults::default()).unwrap();

        assert_eq!(config.api_url.as_str(), "https://api.example.com/");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.revert_delay, Duration::from_millis(1000));
        assert_eq!(
            config.tls,
            TlsVerification::CustomCa(PathBuf::from("/etc/ssl/cloud.pem"))
        );
        assert!(!config.password.expose_secret().is_empty());
    }

    #[test]
    fn invalid_url_is_rejected() {
        let mut p = profile();
        p.api_url = "not a url".into();

        let err =
            profile_to_bridge_config(&p, "evbridge-test-url", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "api_url"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut p = profile();
        p.timeout = Some(0);

        let err = profile_to_bridge_config(&p, "evbridge-test-timeout", &Defaults::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "timeout"));
    }
}
