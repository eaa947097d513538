// Bearer-token authentication
//
// The token endpoint exchanges account credentials for a short-lived
// access token. `AuthManager` caches the token with its computed expiry
// and re-authenticates lazily once it lapses. Refresh is proactive
// (expiry-based); a 401 from another endpoint is not retried.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::endpoint_url;
use crate::error::Error;

const TOKEN_PATH: &str = "/token";

/// Account credentials for the password grant.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A cached access token. Never mutated in place; re-authentication
/// replaces the whole value.
#[derive(Debug, Clone)]
pub struct AuthSession {
    token: SecretString,
    expires_at: DateTime<Utc>,
    raw_response: serde_json::Value,
}

impl AuthSession {
    pub fn new(
        token: SecretString,
        expires_at: DateTime<Utc>,
        raw_response: serde_json::Value,
    ) -> Self {
        Self {
            token,
            expires_at,
            raw_response,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// The token endpoint's full JSON response.
    pub fn raw_response(&self) -> &serde_json::Value {
        &self.raw_response
    }

    /// Valid iff `now < expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Build the `Authorization: Bearer <token>` header value.
    pub fn header_value(&self) -> Result<HeaderValue, Error> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.token.expose_secret()))
            .map_err(|_| Error::Authentication {
                reason: "access token contains characters not allowed in a header".into(),
                status: None,
                body: String::new(),
            })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// Shape of a successful token response. Both fields are optional here so
/// that a missing field becomes an explicit authentication error.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<serde_json::Value>,
}

/// Owns the account's bearer token and its re-authentication.
///
/// One manager is shared (via `Arc`) by every request executor of an
/// account. The internal mutex serializes refreshes, so concurrent callers
/// that all observe an expired token trigger a single authentication.
pub struct AuthManager {
    http: reqwest::Client,
    token_url: Url,
    credentials: Credentials,
    timeout_secs: u64,
    session: Mutex<Option<Arc<AuthSession>>>,
}

impl AuthManager {
    pub fn new(
        http: reqwest::Client,
        base_url: &Url,
        credentials: Credentials,
        timeout_secs: u64,
    ) -> Result<Self, Error> {
        Ok(Self {
            http,
            token_url: endpoint_url(base_url, TOKEN_PATH)?,
            credentials,
            timeout_secs,
            session: Mutex::new(None),
        })
    }

    /// Return a valid authorization header, authenticating first when no
    /// session is cached or the cached one has expired.
    pub async fn ensure_authorized(&self) -> Result<HeaderValue, Error> {
        let mut guard = self.session.lock().await;

        if let Some(session) = guard.as_ref() {
            if session.is_valid() {
                return session.header_value();
            }
            debug!(expired_at = %session.expires_at(), "cached access token expired");
        }

        // Drop the stale token before trying, so a failed refresh leaves
        // nothing usable behind.
        *guard = None;

        let session = self.authenticate().await?;
        let header = session.header_value()?;
        *guard = Some(Arc::new(session));
        Ok(header)
    }

    /// The currently cached session, valid or not.
    pub async fn session(&self) -> Option<Arc<AuthSession>> {
        self.session.lock().await.clone()
    }

    /// Seed the cache with a previously obtained session.
    pub async fn install_session(&self, session: AuthSession) {
        *self.session.lock().await = Some(Arc::new(session));
    }

    async fn authenticate(&self) -> Result<AuthSession, Error> {
        debug!(
            url = %self.token_url,
            username = %self.credentials.username,
            "requesting access token"
        );

        let form = [
            ("grant_type", "password"),
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.expose_secret()),
        ];

        let resp = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| classify_transport(e, self.timeout_secs))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| classify_transport(e, self.timeout_secs))?;

        if !status.is_success() {
            warn!(%status, "token endpoint rejected credentials");
            return Err(Error::Authentication {
                reason: format!("token endpoint returned HTTP {status}"),
                status: Some(status.as_u16()),
                body,
            });
        }

        let session = parse_token_response(&body, Utc::now()).map_err(|reason| {
            Error::Authentication {
                reason,
                status: Some(status.as_u16()),
                body: body.clone(),
            }
        })?;

        info!(expires_at = %session.expires_at(), "authenticated");
        Ok(session)
    }
}

/// Turn a token endpoint body into a session expiring `expires_in` seconds
/// after `now`. Errors carry the human-readable reason.
fn parse_token_response(body: &str, now: DateTime<Utc>) -> Result<AuthSession, String> {
    let raw: serde_json::Value =
        serde_json::from_str(body).map_err(|e| format!("token response is not valid JSON: {e}"))?;

    let parsed: TokenResponse = serde_json::from_value(raw.clone())
        .map_err(|e| format!("token response has an unexpected shape: {e}"))?;

    let token = parsed
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| "token response is missing access_token".to_string())?;

    let expires_in = parsed
        .expires_in
        .as_ref()
        .and_then(expires_in_seconds)
        .ok_or_else(|| "token response is missing expires_in".to_string())?;

    let lifetime = TimeDelta::try_seconds(expires_in)
        .ok_or_else(|| format!("expires_in out of range: {expires_in}"))?;

    Ok(AuthSession::new(
        SecretString::from(token),
        now + lifetime,
        raw,
    ))
}

/// `expires_in` arrives as a number on most deployments, as a string on some.
fn expires_in_seconds(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn classify_transport(err: reqwest::Error, timeout_secs: u64) -> Error {
    if err.is_timeout() {
        Error::Timeout { timeout_secs }
    } else {
        Error::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn parses_token_and_computes_expiry() {
        let session =
            parse_token_response(r#"{"access_token":"abc","expires_in":3600}"#, now()).unwrap();
        assert_eq!(session.expires_at(), now() + TimeDelta::seconds(3600));
        assert_eq!(session.raw_response()["access_token"], "abc");
    }

    #[test]
    fn accepts_string_expires_in() {
        let session =
            parse_token_response(r#"{"access_token":"abc","expires_in":"60"}"#, now()).unwrap();
        assert_eq!(session.expires_at(), now() + TimeDelta::seconds(60));
    }

    #[test]
    fn rejects_missing_token() {
        let err = parse_token_response(r#"{"expires_in":3600}"#, now()).unwrap_err();
        assert!(err.contains("access_token"), "{err}");
    }

    #[test]
    fn rejects_missing_expiry() {
        let err = parse_token_response(r#"{"access_token":"abc"}"#, now()).unwrap_err();
        assert!(err.contains("expires_in"), "{err}");
    }

    #[test]
    fn rejects_non_json_body() {
        let err = parse_token_response("<html>oops</html>", now()).unwrap_err();
        assert!(err.contains("not valid JSON"), "{err}");
    }

    #[test]
    fn validity_is_strictly_before_expiry() {
        let session = AuthSession::new("t".to_string().into(), now(), serde_json::Value::Null);
        assert!(session.is_valid_at(now() - TimeDelta::seconds(1)));
        assert!(!session.is_valid_at(now()));
    }

    #[test]
    fn header_is_bearer_and_sensitive() {
        let session = AuthSession::new("tok".to_string().into(), now(), serde_json::Value::Null);
        let header = session.header_value().unwrap();
        assert_eq!(header.to_str().unwrap(), "Bearer tok");
        assert!(header.is_sensitive());
    }
}
