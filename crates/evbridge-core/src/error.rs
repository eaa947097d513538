// ── Core error types ──
//
// Domain errors from evbridge-core. Consumers never match on reqwest or
// serde failures directly; the `From<evbridge_api::Error>` impl translates
// transport-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the charger cloud at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        message: String,
        status: Option<u16>,
    },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Charger {address} is offline (hub: {hub}, charger: {charger})")]
    Connectivity {
        address: String,
        hub: String,
        charger: String,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Charger not found: {address}")]
    ChargerNotFound { address: String },

    #[error("Unexpected response from the charger cloud: {message}")]
    ResponseFormat { message: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation rejected: {message}")]
    Rejected { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Command queue is closed")]
    QueueClosed,

    #[error("Queued task was aborted before completing")]
    TaskAborted,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Whether the next poll may succeed without intervention.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::Connectivity { .. }
                | Self::Api {
                    status: Some(500..),
                    ..
                }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<evbridge_api::Error> for CoreError {
    fn from(err: evbridge_api::Error) -> Self {
        match err {
            evbridge_api::Error::Authentication { reason, status, .. } => {
                CoreError::AuthenticationFailed {
                    message: reason,
                    status,
                }
            }
            evbridge_api::Error::Request { status, body } => {
                let preview: String = body.chars().take(200).collect();
                CoreError::Api {
                    message: if preview.is_empty() {
                        format!("HTTP {status}")
                    } else {
                        format!("HTTP {status}: {preview}")
                    },
                    status: Some(status),
                }
            }
            evbridge_api::Error::ResponseFormat { message, .. } => {
                CoreError::ResponseFormat { message }
            }
            evbridge_api::Error::Connectivity {
                address,
                hub,
                charger,
            } => CoreError::Connectivity {
                address,
                hub,
                charger,
            },
            evbridge_api::Error::Transport(ref e) => {
                if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            evbridge_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            evbridge_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            evbridge_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
        }
    }
}
