//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod chargers;
pub mod config_cmd;
pub mod run;
pub mod session;

use evbridge_core::BridgeConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a cloud-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: BridgeConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Chargers => chargers::list(config, global).await,
        Command::Status(args) => chargers::status(config, args, global).await,
        Command::Lock(args) => chargers::set_lock(config, args, true, global).await,
        Command::Unlock(args) => chargers::set_lock(config, args, false, global).await,
        Command::Pause => session::set_power(config, false, global).await,
        Command::Resume => session::set_power(config, true, global).await,
        Command::Session => session::show(config, global).await,
        Command::Vehicle => session::vehicle(config, global).await,
        Command::Run(args) => run::handle(config, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "handled without a bridge".into(),
        }),
    }
}
