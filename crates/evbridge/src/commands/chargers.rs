//! Charger command handlers: list, status, lock, unlock.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use evbridge_core::{
    Bridge, BridgeConfig, ChargerAccessory, ChargerStatus, Command as CoreCommand, CommandResult,
    ContactState, LockState, NullHost,
};

use crate::cli::{AddressArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── List ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChargerView {
    address: String,
    model: Option<String>,
    hub_address: Option<String>,
    lock: Option<LockState>,
    power_on: Option<bool>,
    contact: Option<ContactState>,
}

impl From<&ChargerAccessory> for ChargerView {
    fn from(accessory: &ChargerAccessory) -> Self {
        let device = accessory.device();
        let state = accessory.state();
        Self {
            address: device.address.clone(),
            model: device.charger_model.clone(),
            hub_address: device.hub_address.clone(),
            lock: state.lock_current,
            power_on: state.power_on,
            contact: state.contact,
        }
    }
}

#[derive(Tabled)]
struct ChargerRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Hub")]
    hub: String,
    #[tabled(rename = "Lock")]
    lock: String,
    #[tabled(rename = "Session")]
    power: String,
    #[tabled(rename = "Vehicle")]
    contact: String,
}

pub async fn list(config: BridgeConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let views: Vec<ChargerView> = Bridge::oneshot(config, Arc::new(NullHost), |bridge| async move {
        Ok(bridge.accessories().iter().map(ChargerView::from).collect())
    })
    .await?;

    let color = output::should_color(global.color());
    let rendered = output::render_list(
        global.output(),
        &views,
        |v| ChargerRow {
            address: v.address.clone(),
            model: v.model.clone().unwrap_or_else(|| "-".into()),
            hub: v.hub_address.clone().unwrap_or_else(|| "-".into()),
            lock: output::paint_lock(v.lock, color),
            power: output::paint_power(v.power_on, color),
            contact: output::paint_contact(v.contact, color),
        },
        |v| v.address.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

// ── Status ───────────────────────────────────────────────────────────

pub async fn status(
    config: BridgeConfig,
    args: AddressArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let address = args.address;
    let lookup = address.clone();
    let status: ChargerStatus = Bridge::oneshot(config, Arc::new(NullHost), |bridge| async move {
        bridge.charger_status(&lookup).await
    })
    .await?;

    let rendered = output::render_single(
        global.output(),
        &status,
        |s| {
            output::detail_lines(&[
                ("address", address.clone()),
                ("hub", s.hub_code()),
                ("charger", s.charger_code()),
                ("reachable", "yes".into()),
            ])
        },
        |_| address.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

// ── Lock / unlock ────────────────────────────────────────────────────

pub async fn set_lock(
    config: BridgeConfig,
    args: AddressArgs,
    locked: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let cmd = CoreCommand::SetLock {
        address: args.address,
        locked,
    };
    let result = Bridge::oneshot(config, Arc::new(NullHost), |bridge| async move {
        bridge.execute(cmd).await
    })
    .await?;

    report(&result, global)
}

fn report(result: &CommandResult, global: &GlobalOpts) -> Result<(), CliError> {
    if global.quiet {
        return Ok(());
    }
    let format = global.output();
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let rendered =
                output::render_single(format, result, |_| String::new(), |_| String::new())?;
            output::print_output(&rendered, false);
        }
        OutputFormat::Table | OutputFormat::Plain => {
            if let CommandResult::Lock { address, state } = result {
                eprintln!("Charger {address} is now {state}");
            }
        }
    }
    Ok(())
}
