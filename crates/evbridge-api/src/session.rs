// Charging session endpoints
//
// The account has at most one active session. Its absence is a normal
// outcome: `fetch_active_session` returns `None` and `is_session_alive`
// returns `false` rather than an error.

use strum::{AsRefStr, Display};
use tracing::debug;

use crate::client::{ApiClient, RequestOptions};
use crate::error::Error;
use crate::models::{Session, VehicleInfo};

/// Power-axis command against the active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum SessionAction {
    Pause,
    Resume,
}

impl SessionAction {
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Pause => "/api/session/Pause",
            Self::Resume => "/api/session/unpause",
        }
    }

    /// The action that leaves the session charging (`true`) or paused.
    pub fn for_power(on: bool) -> Self {
        if on { Self::Resume } else { Self::Pause }
    }
}

impl ApiClient {
    /// Fetch the active charging session, if any.
    ///
    /// An empty body, `null`, or `{}` all mean "no session".
    pub async fn fetch_active_session(&self) -> Result<Option<Session>, Error> {
        let resp = self
            .request(
                reqwest::Method::GET,
                "/api/session",
                RequestOptions::new().without_body(),
            )
            .await?;

        parse_session(&resp.raw_body)
    }

    /// Whether a vehicle is currently connected.
    ///
    /// Never fails: any request error, including a missing session, is
    /// reported as `false`.
    pub async fn is_session_alive(&self) -> bool {
        match self
            .request(
                reqwest::Method::GET,
                "/api/session/alive",
                RequestOptions::new().without_body(),
            )
            .await
        {
            Ok(resp) => !matches!(resp.raw_body.trim(), "false" | "0"),
            Err(e) => {
                debug!(error = %e, "session alive check failed, treating as not alive");
                false
            }
        }
    }

    pub async fn apply_session_action(&self, action: SessionAction) -> Result<(), Error> {
        debug!(%action, "session command");
        self.post_command(action.endpoint(), RequestOptions::new())
            .await
    }

    pub async fn pause_session(&self) -> Result<(), Error> {
        self.apply_session_action(SessionAction::Pause).await
    }

    pub async fn resume_session(&self) -> Result<(), Error> {
        self.apply_session_action(SessionAction::Resume).await
    }

    /// Details of the vehicle attached to the account.
    pub async fn vehicle_info(&self) -> Result<VehicleInfo, Error> {
        self.get_json("/api/vehicle", RequestOptions::new()).await
    }
}

fn parse_session(raw: &str) -> Result<Option<Session>, Error> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value =
        serde_json::from_str(trimmed).map_err(|e| Error::ResponseFormat {
            message: e.to_string(),
            body: raw.to_owned(),
        })?;

    match &value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) if map.is_empty() => Ok(None),
        _ => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| Error::ResponseFormat {
                message: e.to_string(),
                body: raw.to_owned(),
            }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn empty_bodies_mean_no_session() {
        assert_eq!(parse_session("").unwrap(), None);
        assert_eq!(parse_session("  null ").unwrap(), None);
        assert_eq!(parse_session("{}").unwrap(), None);
    }

    #[test]
    fn parses_paused_session() {
        let session = parse_session(r#"{"isPaused":true,"kwh":3.5}"#)
            .unwrap()
            .unwrap();
        assert!(session.is_paused);
        assert!(!session.is_overridden);
        assert_eq!(session.telemetry["kwh"], 3.5);
    }

    #[test]
    fn garbage_is_a_format_error() {
        let err = parse_session("not json").unwrap_err();
        assert!(matches!(err, Error::ResponseFormat { .. }));
    }

    #[test]
    fn action_endpoints() {
        assert_eq!(SessionAction::for_power(true).endpoint(), "/api/session/unpause");
        assert_eq!(SessionAction::for_power(false).endpoint(), "/api/session/Pause");
    }
}
