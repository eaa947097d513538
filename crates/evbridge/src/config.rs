//! CLI flag overrides on top of `evbridge-config` profiles.
//!
//! Core never sees these types -- it receives a pre-built `BridgeConfig`.

use clap::ValueEnum;
use evbridge_config::{Config, ConfigError, Profile};
use evbridge_core::BridgeConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Profile name selected by `--profile`, the config's default, or "default".
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    cfg.profile_name(global.profile.as_deref())
}

/// Fill `--output` and `--color` from `[defaults]` when not given.
pub fn apply_display_defaults(global: &mut GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    if global.output.is_none() {
        global.output = Some(parse_default("output", &cfg.defaults.output)?);
    }
    if global.color.is_none() {
        global.color = Some(parse_default("color", &cfg.defaults.color)?);
    }
    Ok(())
}

fn parse_default<T: ValueEnum>(key: &str, value: &str) -> Result<T, CliError> {
    <T as ValueEnum>::from_str(value, true).map_err(|reason| CliError::Validation {
        field: format!("defaults.{key}"),
        reason,
    })
}

/// Build a `BridgeConfig` from the config file, profile, and CLI overrides.
pub fn build_bridge_config(global: &GlobalOpts, cfg: &Config) -> Result<BridgeConfig, CliError> {
    let (profile_name, mut profile) = match cfg.profile(global.profile.as_deref()) {
        Ok((name, profile)) => (name, profile.clone()),
        // No profile: flags / env alone must name the account.
        Err(ConfigError::ProfileNotFound { name }) => match global.api_url {
            Some(ref api_url) => {
                let profile = Profile {
                    api_url: api_url.clone(),
                    ..Profile::default()
                };
                (name, profile)
            }
            None if global.profile.is_some() => {
                return Err(CliError::ProfileNotFound { name });
            }
            None => {
                return Err(CliError::NoConfig {
                    path: evbridge_config::config_path().display().to_string(),
                });
            }
        },
        Err(e) => return Err(e.into()),
    };

    apply_overrides(&mut profile, global);
    Ok(evbridge_config::profile_to_bridge_config(
        &profile,
        &profile_name,
        &cfg.defaults,
    )?)
}

fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref api_url) = global.api_url {
        profile.api_url.clone_from(api_url);
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, ColorMode, OutputFormat};

    fn global(args: &[&str]) -> GlobalOpts {
        Cli::try_parse_from(args).unwrap().global
    }

    #[test]
    fn display_defaults_fill_missing_flags() {
        let mut cfg = Config::default();
        cfg.defaults.output = "json".into();
        cfg.defaults.color = "never".into();

        let mut g = global(&["evbridge", "chargers"]);
        apply_display_defaults(&mut g, &cfg).unwrap();

        assert_eq!(g.output(), OutputFormat::Json);
        assert_eq!(g.color(), ColorMode::Never);
    }

    #[test]
    fn explicit_flags_beat_display_defaults() {
        let mut cfg = Config::default();
        cfg.defaults.output = "json".into();

        let mut g = global(&["evbridge", "-o", "plain", "--color", "always", "chargers"]);
        apply_display_defaults(&mut g, &cfg).unwrap();

        assert_eq!(g.output(), OutputFormat::Plain);
        assert_eq!(g.color(), ColorMode::Always);
    }

    #[test]
    fn bad_display_default_is_a_validation_error() {
        let mut cfg = Config::default();
        cfg.defaults.output = "yaml".into();

        let mut g = global(&["evbridge", "chargers"]);
        let err = apply_display_defaults(&mut g, &cfg).unwrap_err();

        assert!(matches!(
            err,
            CliError::Validation { ref field, .. } if field == "defaults.output"
        ));
    }

    #[test]
    fn unknown_named_profile_is_reported() {
        let g = global(&["evbridge", "--profile", "garage", "chargers"]);
        let err = build_bridge_config(&g, &Config::default()).unwrap_err();
        assert!(matches!(err, CliError::ProfileNotFound { ref name } if name == "garage"));
    }
}
