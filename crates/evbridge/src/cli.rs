//! Clap derive structures for the `evbridge` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// evbridge -- control cloud-connected EV chargers and bridge them to a
/// smart-home host
#[derive(Debug, Parser)]
#[command(
    name = "evbridge",
    version,
    about = "Control cloud-connected EV chargers from the command line",
    long_about = "Lock and unlock chargers, pause and resume charging sessions, and run\n\
        a bridge daemon that mirrors charger state as accessory characteristics.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "EVBRIDGE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Charger cloud API root (overrides profile)
    #[arg(long, env = "EVBRIDGE_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Account username (overrides profile)
    #[arg(long, short = 'u', env = "EVBRIDGE_USERNAME", global = true)]
    pub username: Option<String>,

    /// Output format [default: table, or `defaults.output` from config]
    #[arg(long, short = 'o', env = "EVBRIDGE_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: auto, or `defaults.color`]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "EVBRIDGE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

impl GlobalOpts {
    pub fn output(&self) -> OutputFormat {
        self.output.unwrap_or(OutputFormat::Table)
    }

    pub fn color(&self) -> ColorMode {
        self.color.unwrap_or(ColorMode::Auto)
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List chargers with their lock, power, and vehicle state
    #[command(alias = "ls")]
    Chargers,

    /// Show hub and charger reachability
    Status(AddressArgs),

    /// Lock (disable) a charger
    Lock(AddressArgs),

    /// Unlock (enable) a charger
    Unlock(AddressArgs),

    /// Pause the active charging session
    Pause,

    /// Resume the active charging session
    Resume,

    /// Show the active charging session
    Session,

    /// Show the vehicle attached to the account
    Vehicle,

    /// Run the bridge: poll the cloud and report characteristic changes
    Run(RunArgs),

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AddressArgs {
    /// Charger address (see `evbridge chargers`)
    pub address: String,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Session poll interval in seconds (overrides profile; 0 disables)
    #[arg(long)]
    pub poll_interval: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the resolved configuration (passwords redacted)
    Show,

    /// Create or replace a profile
    Init {
        /// Charger cloud API root
        #[arg(long)]
        api_url: String,

        /// Account username
        #[arg(long)]
        username: String,

        /// Make this the default profile
        #[arg(long)]
        default: bool,
    },

    /// Store the profile's password in the system keyring (read from stdin)
    SetPassword,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
