//! Bridge between a cloud EV-charger account and smart-home accessories.
//!
//! This crate owns the domain model, the serialized command pipeline, and
//! the state reconciliation that turns charger and session data into
//! accessory characteristics:
//!
//! - **[`Bridge`]**: Facade for one account: [`start()`](Bridge::start)
//!   discovers chargers, creates one [`ChargerAccessory`] per address,
//!   runs an initial session check, and spawns the poller.
//!   [`Bridge::oneshot()`](Bridge::oneshot) is the lightweight mode for
//!   single CLI invocations.
//!
//! - **[`CommandQueue`]**: FIFO queue with a concurrency limit of one.
//!   Every remote call (polls, lock/unlock, pause/resume, ad-hoc queries)
//!   is admitted here, so calls never overlap and a failed task never
//!   blocks its successors.
//!
//! - **[`ChargerAccessory`]**: Lock, power, and contact characteristics
//!   for one charger, with change suppression, optimistic updates, and the
//!   power revert guard.
//!
//! - **[`AccessoryHost`]**: Where characteristic changes go.
//!   [`BroadcastHost`] republishes them on a `tokio::sync::broadcast`
//!   channel.

pub mod accessory;
pub mod bridge;
pub mod command;
pub mod config;
pub mod convert;
pub mod error;
pub mod host;
pub mod model;
pub mod poller;

// ── Primary re-exports ──────────────────────────────────────────────
pub use accessory::{AccessoryState, ChargerAccessory, RevertState};
pub use bridge::{Bridge, BridgeState};
pub use command::{Command, CommandQueue, CommandResult, TaskHandle};
pub use config::{BridgeConfig, TlsVerification};
pub use error::CoreError;
pub use host::{AccessoryHost, BroadcastHost, CharacteristicEvent, NullHost};
pub use poller::PollOutcome;

pub use model::{
    Characteristic, CharacteristicUpdate, ChargeSession, ContactState, DeviceSnapshot, LockState,
    SessionSnapshot,
};

// API types that appear in this crate's public signatures.
pub use evbridge_api::{ChargerStatus, SessionAction, VehicleInfo};
