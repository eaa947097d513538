//! Config command handlers. None of these touch the charger cloud.

use std::io::BufRead;

use serde_json::Value;

use evbridge_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::active_profile_name;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(
                &evbridge_config::config_path().display().to_string(),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = evbridge_config::load_config()?;
            let rendered = serde_json::to_string_pretty(&redacted(&cfg)?)?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Init {
            api_url,
            username,
            default,
        } => {
            url::Url::parse(&api_url).map_err(|e| CliError::Validation {
                field: "api_url".into(),
                reason: e.to_string(),
            })?;

            let mut cfg = evbridge_config::load_config()?;
            let name = active_profile_name(global, &cfg);
            let profile = Profile {
                api_url,
                username: Some(username),
                ..cfg.profiles.get(&name).cloned().unwrap_or_default()
            };
            cfg.profiles.insert(name.clone(), profile);
            if default {
                cfg.default_profile = Some(name.clone());
            }
            evbridge_config::save_config(&cfg)?;

            if !global.quiet {
                eprintln!(
                    "Profile '{name}' written to {}",
                    evbridge_config::config_path().display()
                );
            }
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = evbridge_config::load_config()?;
            let name = active_profile_name(global, &cfg);

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            let password = line.trim_end_matches(['\r', '\n']);
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "no password on stdin".into(),
                });
            }

            evbridge_config::store_password(&name, password)?;
            if !global.quiet {
                eprintln!("Password for profile '{name}' stored in the system keyring");
            }
            Ok(())
        }
    }
}

/// Config as JSON with plaintext passwords masked.
fn redacted(cfg: &Config) -> Result<Value, CliError> {
    let mut value = serde_json::to_value(cfg)?;
    if let Some(profiles) = value.get_mut("profiles").and_then(Value::as_object_mut) {
        for profile in profiles.values_mut() {
            if let Some(pw) = profile.get_mut("password") {
                if !pw.is_null() {
                    *pw = Value::String(REDACTED.into());
                }
            }
        }
    }
    Ok(value)
}
