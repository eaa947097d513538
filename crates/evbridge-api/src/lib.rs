// evbridge-api: Async Rust client for the cloud EV-charger control API

pub mod auth;
pub mod chargers;
pub mod client;
pub mod error;
pub mod models;
pub mod session;
pub mod transport;

pub use auth::{AuthManager, AuthSession, Credentials};
pub use chargers::ChargerAction;
pub use client::{ApiClient, ApiResponse, RequestOptions};
pub use error::Error;
pub use models::{Charger, ChargerStatus, Session, VehicleInfo};
pub use session::SessionAction;
pub use transport::{TlsMode, TransportConfig};
