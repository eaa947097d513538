//! Session and vehicle command handlers.

use std::sync::Arc;

use serde_json::Value;

use evbridge_core::{Bridge, BridgeConfig, NullHost, SessionAction, SessionSnapshot, VehicleInfo};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn set_power(
    config: BridgeConfig,
    on: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let action = SessionAction::for_power(on);
    Bridge::oneshot(config, Arc::new(NullHost), |bridge| async move {
        bridge.apply_session_action(action).await
    })
    .await?;

    if !global.quiet {
        eprintln!("Session {}", if on { "resumed" } else { "paused" });
    }
    Ok(())
}

pub async fn show(config: BridgeConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot: SessionSnapshot =
        Bridge::oneshot(config, Arc::new(NullHost), |bridge| async move {
            bridge.active_session().await
        })
        .await?;

    let rendered = output::render_single(
        global.output(),
        &snapshot,
        session_detail,
        |s| if s.power_on() { "charging" } else { "idle" }.to_owned(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn session_detail(snapshot: &SessionSnapshot) -> String {
    let vehicle = if snapshot.alive { "connected" } else { "none" };
    let Some(ref session) = snapshot.session else {
        return output::detail_lines(&[("session", "none".into()), ("vehicle", vehicle.into())]);
    };

    let mut pairs = vec![
        ("session", "active".to_owned()),
        ("paused", session.is_paused.to_string()),
        ("overridden", session.is_overridden.to_string()),
        ("vehicle", vehicle.to_owned()),
    ];
    let mut keys: Vec<&String> = session.telemetry.keys().collect();
    keys.sort();
    for key in keys {
        pairs.push((key.as_str(), scalar_text(&session.telemetry[key])));
    }
    output::detail_lines(&pairs)
}

pub async fn vehicle(config: BridgeConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let info: VehicleInfo = Bridge::oneshot(config, Arc::new(NullHost), |bridge| async move {
        bridge.vehicle_info().await
    })
    .await?;

    let rendered = output::render_single(global.output(), &info, vehicle_detail, |v| {
        v.get("id").map(scalar_text).unwrap_or_default()
    })?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn vehicle_detail(info: &VehicleInfo) -> String {
    match info.raw {
        Value::Object(ref map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let pairs: Vec<(&str, String)> = keys
                .into_iter()
                .map(|k| (k.as_str(), scalar_text(&map[k])))
                .collect();
            output::detail_lines(&pairs)
        }
        ref other => scalar_text(other),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".into(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scalar_text_unquotes_strings() {
        assert_eq!(scalar_text(&json!("Model 3")), "Model 3");
        assert_eq!(scalar_text(&json!(null)), "-");
        assert_eq!(scalar_text(&json!(72.5)), "72.5");
    }

    #[test]
    fn no_session_detail() {
        let text = session_detail(&SessionSnapshot::default());
        assert!(text.contains("session  none"));
        assert!(text.contains("vehicle  none"));
    }
}
