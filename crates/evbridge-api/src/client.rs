// Authenticated HTTP request executor
//
// Wraps `reqwest::Client` with base-URL endpoint construction, proactive
// bearer authentication, header merging, and failure classification. All
// endpoint modules (chargers, session) are implemented as inherent methods
// in separate files to keep this module focused on transport mechanics.

use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::auth::{AuthManager, Credentials, classify_transport};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Per-request knobs for [`ApiClient::request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    /// Form-encoded body. Sets its own content type.
    pub form: Option<Vec<(String, String)>>,
    /// Caller overrides, applied after the defaults and the auth header.
    pub headers: HeaderMap,
    /// When `false`, the body is not parsed and `ApiResponse::body` is `Null`.
    pub expect_body: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            query: Vec::new(),
            form: None,
            headers: HeaderMap::new(),
            expect_body: true,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_owned(), value.to_owned()));
        self
    }

    pub fn form_field(mut self, key: &str, value: &str) -> Self {
        self.form
            .get_or_insert_with(Vec::new)
            .push((key.to_owned(), value.to_owned()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn without_body(mut self) -> Self {
        self.expect_body = false;
        self
    }
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// Parsed JSON, or `Null` when the caller did not expect a body.
    pub body: serde_json::Value,
    pub raw_body: String,
}

impl ApiResponse {
    /// Deserialize the parsed body into a typed model.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(self.body.clone()).map_err(|e| Error::ResponseFormat {
            message: e.to_string(),
            body: self.raw_body.clone(),
        })
    }
}

/// HTTP client for the charger cloud API.
///
/// Every call first asks the shared [`AuthManager`] for a header. A still
/// valid cached token short-circuits authentication.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Arc<AuthManager>,
    timeout_secs: u64,
}

impl ApiClient {
    /// Create a client (and its auth manager) from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `https://api.example.com`; endpoint
    /// paths such as `/api/mini/list` are appended to it.
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let auth = Arc::new(AuthManager::new(
            http.clone(),
            &base_url,
            credentials,
            transport.timeout_secs(),
        )?);
        Ok(Self {
            http,
            base_url,
            auth,
            timeout_secs: transport.timeout_secs(),
        })
    }

    /// Create a client around a pre-built `reqwest::Client` and an auth
    /// manager that may be shared with other clients of the same account.
    ///
    /// `timeout_secs` must match the timeout `http` was built with; it is
    /// what [`Error::Timeout`] reports.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        auth: Arc<AuthManager>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            http,
            base_url,
            auth,
            timeout_secs,
        }
    }

    /// Convenience for tests and one-off tools: plain `reqwest::Client`,
    /// fresh auth manager.
    pub fn from_reqwest(
        base_url: Url,
        http: reqwest::Client,
        credentials: Credentials,
    ) -> Result<Self, Error> {
        let timeout_secs = TransportConfig::default().timeout_secs();
        let auth = Arc::new(AuthManager::new(
            http.clone(),
            &base_url,
            credentials,
            timeout_secs,
        )?);
        Ok(Self::with_client(http, base_url, auth, timeout_secs))
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Perform an authorized request.
    ///
    /// Headers are merged as defaults (JSON accept / content type), then the
    /// bearer header, then `options.headers`. Non-success statuses become
    /// [`Error::Request`]; an unparseable expected body becomes
    /// [`Error::ResponseFormat`].
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, Error> {
        let authorization = self.auth.ensure_authorized().await?;
        let url = endpoint_url(&self.base_url, endpoint)?;

        debug!("{} {}", method, url);

        let content_type = if options.form.is_some() {
            "application/x-www-form-urlencoded"
        } else {
            "application/json"
        };
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers.insert(AUTHORIZATION, authorization);
        headers.extend(options.headers);

        let mut builder = self.http.request(method, url);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(form) = &options.form {
            builder = builder.form(form);
        }
        // Last, so caller overrides win over anything set above.
        builder = builder.headers(headers);

        let resp = builder
            .send()
            .await
            .map_err(|e| classify_transport(e, self.timeout_secs))?;

        let status = resp.status();
        let raw_body = resp
            .text()
            .await
            .map_err(|e| classify_transport(e, self.timeout_secs))?;

        trace!(%status, body_len = raw_body.len(), "response received");

        if !status.is_success() {
            return Err(Error::Request {
                status: status.as_u16(),
                body: raw_body,
            });
        }

        if !options.expect_body {
            return Ok(ApiResponse {
                status,
                body: serde_json::Value::Null,
                raw_body,
            });
        }

        let body = serde_json::from_str(&raw_body).map_err(|e| {
            let preview: String = raw_body.chars().take(200).collect();
            Error::ResponseFormat {
                message: format!("{e} (body preview: {preview:?})"),
                body: raw_body.clone(),
            }
        })?;

        Ok(ApiResponse {
            status,
            body,
            raw_body,
        })
    }

    /// GET and deserialize the body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, Error> {
        self.request(Method::GET, endpoint, options).await?.json()
    }

    /// POST for side effects only; the body is ignored.
    pub(crate) async fn post_command(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<(), Error> {
        self.request(Method::POST, endpoint, options.without_body())
            .await
            .map(|_| ())
    }
}

/// Build `{base}{path}`, preserving any path prefix on the base URL.
pub(crate) fn endpoint_url(base: &Url, path: &str) -> Result<Url, Error> {
    let base = base.as_str().trim_end_matches('/');
    Ok(Url::parse(&format!("{base}{path}"))?)
}
