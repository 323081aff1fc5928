// Request gateway for the tracker REST API.
//
// Every call goes through `ApiClient::execute`: bearer token attached,
// cancellation raced against the round-trip, and a 401 on an authenticated
// call turned into one serialized refresh plus a single replay.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::session::SessionStore;
use crate::transport::TransportConfig;

/// Base URL used when no profile overrides it.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/";

// ── Error response shape (DRF) ──────────────────────────────────────

/// Fields the server uses for form-level messages, in priority order.
const MESSAGE_FIELDS: [&str; 3] = ["detail", "message", "error"];

/// Pull a human-readable message out of an error body.
///
/// Handles `{"detail": "..."}`, `{"message": "..."}`, `{"error": "..."}` and
/// field errors such as `{"title": ["This field may not be blank."]}`.
fn server_message(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;

    for field in MESSAGE_FIELDS {
        if let Some(text) = object.get(field).and_then(first_text) {
            return Some(text);
        }
    }

    object.iter().find_map(|(field, value)| {
        let text = first_text(value)?;
        if field == "non_field_errors" {
            Some(text)
        } else {
            Some(format!("{field}: {text}"))
        }
    })
}

fn first_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}

fn fallback_message(status: StatusCode) -> String {
    match status {
        StatusCode::FORBIDDEN => "You do not have permission to perform this action.".into(),
        StatusCode::NOT_FOUND => "The requested resource was not found.".into(),
        _ => status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_owned),
    }
}

// ── Request description ─────────────────────────────────────────────

/// A replayable description of one API call.
///
/// Kept as data rather than a `reqwest::RequestBuilder` so the gateway can
/// re-issue it after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    anonymous: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            anonymous: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, params: Vec<(String, String)>) -> Self {
        self.query.extend(params);
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Send without a bearer token and never trigger the refresh flow.
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }
}

// ── Client ──────────────────────────────────────────────────────────

/// Where and how to reach the API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub transport: TransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL should parse"),
            transport: TransportConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            transport: TransportConfig::default(),
        })
    }
}

/// Async client for the tracker API. Cheap to clone; clones share the
/// connection pool and the session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<SessionStore>,
}

impl ApiClient {
    // ── Constructors ─────────────────────────────────────────────────

    pub fn new(config: &ClientConfig, session: Arc<SessionStore>) -> Result<Self, Error> {
        let http = config.transport.build_client()?;
        Ok(Self::with_client(http, config.base_url.clone(), session))
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, session: Arc<SessionStore>) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
            session,
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join a relative path (e.g. `"webtoons/"`) onto the base URL.
    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Execute a request and decode its JSON body.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        req: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<T, Error> {
        let resp = self.dispatch(req, cancel).await?;
        handle_response(resp, cancel).await
    }

    /// Execute a request whose success body is irrelevant (e.g. 204).
    pub async fn execute_empty(
        &self,
        req: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let resp = self.dispatch(req, cancel).await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(parse_error(status, resp).await)
        }
    }

    /// Send an anonymous request exactly once and decode it. Never enters
    /// the refresh flow, so the refresh call itself goes through here.
    pub(crate) async fn execute_once<T: DeserializeOwned>(
        &self,
        req: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<T, Error> {
        let resp = self.send_once(req, None, cancel).await?;
        handle_response(resp, cancel).await
    }

    /// Send once, and on a 401 renew the access token and replay once.
    async fn dispatch(
        &self,
        req: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, Error> {
        let token = if req.anonymous {
            None
        } else {
            self.session.access_token()
        };

        let resp = self.send_once(req, token.as_ref(), cancel).await?;
        if resp.status() != StatusCode::UNAUTHORIZED || req.anonymous {
            return Ok(resp);
        }
        let Some(rejected) = token else {
            return Ok(resp);
        };

        debug!(path = %req.path, "access token rejected, renewing");
        self.renew_access(&rejected).await?;

        let token = self.session.access_token();
        let resp = self.send_once(req, token.as_ref(), cancel).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(path = %req.path, "replayed request rejected, ending session");
            self.session.clear();
            return Err(Error::SessionExpired);
        }
        Ok(resp)
    }

    /// Obtain a fresh access token after `rejected` got a 401.
    ///
    /// Refreshes are serialized; a caller that finds the token already
    /// rotated by someone else reuses it.
    async fn renew_access(&self, rejected: &SecretString) -> Result<(), Error> {
        let _guard = self.session.refresh_lock().lock().await;

        let rotated = self
            .session
            .access_token()
            .is_some_and(|current| current.expose_secret() != rejected.expose_secret());
        if rotated {
            debug!("access token already renewed by a concurrent request");
            return Ok(());
        }

        self.refresh_locked().await
    }

    async fn send_once(
        &self,
        req: &ApiRequest,
        token: Option<&SecretString>,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, Error> {
        let url = self.url(&req.path)?;
        debug!("{} {url}", req.method);

        let mut builder = self.http.request(req.method.clone(), url);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(ref body) = req.body {
            builder = builder.json(body);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = builder.send() => result.map_err(Error::from_send),
        }
    }
}

/// Ensure the base path ends in `/` so relative joins append to it.
fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

// ── Response handling ───────────────────────────────────────────────

async fn handle_response<T: DeserializeOwned>(
    resp: reqwest::Response,
    cancel: &CancellationToken,
) -> Result<T, Error> {
    let status = resp.status();
    if !status.is_success() {
        return Err(parse_error(status, resp).await);
    }

    let body = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(Error::Cancelled),
        body = resp.text() => body.map_err(Error::from_send)?,
    };

    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}

async fn parse_error(status: StatusCode, resp: reqwest::Response) -> Error {
    let raw = resp.text().await.unwrap_or_default();
    let message = server_message(&raw).unwrap_or_else(|| fallback_message(status));

    match status {
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            Error::ValidationFailed {
                status: status.as_u16(),
                message,
            }
        }
        StatusCode::UNAUTHORIZED => Error::Unauthorized { message },
        StatusCode::FORBIDDEN => Error::Forbidden { message },
        StatusCode::NOT_FOUND => Error::NotFound { message },
        _ => Error::Api {
            status: status.as_u16(),
            message,
        },
    }
}
