use thiserror::Error;

/// Top-level error type for the `evbridge-api` crate.
///
/// Covers every failure mode of the cloud API: authentication, transport,
/// non-success responses, unparseable bodies, and charger connectivity.
/// `evbridge-core` maps these into domain diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The token endpoint refused the credentials, returned a body that is
    /// not a token structure, or omitted the token / expiry fields.
    #[error("Authentication failed: {reason}")]
    Authentication {
        reason: String,
        status: Option<u16>,
        body: String,
    },

    // ── Responses ───────────────────────────────────────────────────
    /// Non-success HTTP status from an authorized endpoint.
    #[error("Request failed (HTTP {status})")]
    Request { status: u16, body: String },

    /// A JSON body was expected but could not be parsed.
    #[error("Unexpected response format: {message}")]
    ResponseFormat { message: String, body: String },

    /// The status payload reports that the hub or the charger is unreachable.
    #[error("Charger {address} is not reachable (hub: {hub}, charger: {charger})")]
    Connectivity {
        address: String,
        hub: String,
        charger: String,
    },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),
}

impl Error {
    /// Returns `true` if the failure came from the token endpoint.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::Connectivity { .. } => true,
            Self::Request { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status attached to the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } => *status,
            Self::Request { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The raw response body, kept for debugging.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            Self::Authentication { body, .. }
            | Self::Request { body, .. }
            | Self::ResponseFormat { body, .. } => Some(body),
            _ => None,
        }
    }
}
