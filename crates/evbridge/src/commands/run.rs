//! `evbridge run`: the long-running bridge.
//!
//! Starts the bridge with a broadcast host and reports every characteristic
//! change on stdout until interrupted.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use evbridge_core::{Bridge, BridgeConfig, BroadcastHost, CharacteristicEvent};

use crate::cli::{GlobalOpts, OutputFormat, RunArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct EventLine<'a> {
    at: String,
    #[serde(flatten)]
    event: &'a CharacteristicEvent,
}

pub async fn handle(
    mut config: BridgeConfig,
    args: RunArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(secs) = args.poll_interval {
        config.poll_interval = Duration::from_secs(secs);
    }
    let interval = config.poll_interval;

    let host = BroadcastHost::default();
    let mut events = host.subscribe();
    let bridge = Bridge::new(config, Arc::new(host))?;

    if let Err(e) = bridge.start().await {
        bridge.shutdown().await;
        return Err(e.into());
    }
    info!(
        chargers = bridge.accessories().len(),
        poll_interval = %humantime::format_duration(interval),
        "bridge running"
    );

    let result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                info!("interrupt received, stopping");
                break signal.map_err(CliError::from);
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Err(e) = report(&event, global) {
                        break Err(e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event reporter lagged"),
                Err(RecvError::Closed) => break Ok(()),
            }
        }
    };

    bridge.shutdown().await;
    result
}

fn report(event: &CharacteristicEvent, global: &GlobalOpts) -> Result<(), CliError> {
    if global.quiet {
        return Ok(());
    }
    let at = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let line = match global.output() {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            serde_json::to_string(&EventLine { at, event })?
        }
        OutputFormat::Table | OutputFormat::Plain => format!(
            "{at}  {}  {}  {}",
            event.address,
            event.update.characteristic(),
            event.update.value_label()
        ),
    };
    output::print_output(&line, false);
    Ok(())
}
