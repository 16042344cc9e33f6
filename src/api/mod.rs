//! Authenticated HTTP transport for the messaging API.
//!
//! Every call goes through [`ApiClient`], which attaches the stored access token
//! as a bearer credential and recovers from access-token expiry on its own:
//!
//! - A 401 on the first attempt triggers one call to the refresh endpoint with
//!   the stored refresh token. On success the new access token is persisted and
//!   the original request is sent again, once, with that token.
//! - If the refresh fails, or the request carried an access token but no refresh
//!   token is stored, both tokens are cleared and the injected [`LoginRedirect`]
//!   fires. The caller still receives the original 401.
//! - A 401 on the retried attempt is returned as-is; no request is sent more
//!   than twice.
//!
//! Concurrent requests that hit an expired token each run their own refresh.
//! Token material is never logged.

mod errors;
mod redirect;

pub use errors::ApiError;
pub use redirect::LoginRedirect;

use crate::{
    storage::{TokenKind, TokenStore},
    APP_USER_AGENT, GIT_COMMIT_HASH,
};
use errors::map_request_error;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Method, Response, StatusCode,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Default API base used when nothing is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// Endpoint exchanging a refresh token for a new access token.
pub const TOKEN_REFRESH_PATH: &str = "/accounts/token/refresh/";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Which dispatch of a request is being made. A request is sent at most once
/// per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    /// Sent again after a successful token refresh.
    Retried,
}

impl Attempt {
    /// The attempt that follows this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::First => Some(Self::Retried),
            Self::Retried => None,
        }
    }
}

/// Outbound call kept intact so it can be dispatched a second time.
struct PendingRequest {
    method: Method,
    url: String,
    body: Option<Value>,
}

/// New credentials returned by the refresh endpoint. `refresh` is only present
/// when the server rotates refresh tokens.
#[derive(Clone, Debug, Deserialize)]
#[serde(from = "RawRefreshResponse")]
pub struct RefreshResponse {
    pub access: SecretString,
    pub refresh: Option<SecretString>,
}

#[derive(Deserialize)]
struct RawRefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

impl From<RawRefreshResponse> for RefreshResponse {
    fn from(raw: RawRefreshResponse) -> Self {
        Self {
            access: SecretString::from(raw.access),
            refresh: raw.refresh.map(SecretString::from),
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
    redirect: Arc<dyn LoginRedirect>,
    session_end_hooks: Mutex<Vec<SessionEndHook>>,
}

type SessionEndHook = Arc<dyn Fn() + Send + Sync>;

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Builds a client for the API rooted at `base_url`.
    ///
    /// # Errors
    /// Returns `ApiError::Config` if the base URL is not an absolute http(s) URL
    /// or the HTTP client cannot be constructed.
    pub fn new(
        base_url: &str,
        tokens: Arc<dyn TokenStore>,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(format!("{APP_USER_AGENT} ({GIT_COMMIT_HASH})"))
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ApiError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                base_url,
                tokens,
                redirect,
                session_end_hooks: Mutex::new(Vec::new()),
            }),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Token store shared with the auth session, the only other writer.
    #[must_use]
    pub(crate) fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.inner.tokens
    }

    /// Whether a token of `kind` is currently stored.
    #[must_use]
    pub fn has_token(&self, kind: TokenKind) -> bool {
        self.inner.tokens.has(kind)
    }

    /// Registers `hook` to run when the transport gives up on the session,
    /// after the tokens are cleared and before the login redirect fires.
    pub fn on_session_end<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner
            .session_end_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    /// Sends a request and decodes the JSON response.
    ///
    /// An empty success body decodes as JSON `null`, so `()`, `Option<T>` and
    /// `Value` are valid targets for endpoints that return nothing.
    ///
    /// # Errors
    /// Returns the remote error unchanged when the request cannot be recovered,
    /// including the original 401 after a failed refresh.
    #[instrument(skip(self, body))]
    pub async fn request<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|err| ApiError::Serialization(format!("Failed to encode request: {err}")))?;

        let pending = PendingRequest {
            method,
            url: self.url(path),
            body,
        };

        let response = self.send(&pending).await?;
        decode(response).await
    }

    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<Value, T>(Method::GET, path, None).await
    }

    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Posts without a request body.
    ///
    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<Value, T>(Method::POST, path, None).await
    }

    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PUT, path, Some(body)).await
    }

    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PATCH, path, Some(body)).await
    }

    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request::<Value, T>(Method::DELETE, path, None).await
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// This goes straight to the refresh endpoint without a bearer header and
    /// without the 401 recovery cycle, so a rejected refresh never recurses.
    ///
    /// # Errors
    /// Returns an error if the request fails or the server rejects the token.
    pub async fn refresh_access_token(
        &self,
        refresh: &SecretString,
    ) -> Result<RefreshResponse, ApiError> {
        let payload = json!({ "refresh": refresh.expose_secret() });
        let response = self
            .inner
            .http
            .post(self.url(TOKEN_REFRESH_PATH))
            .json(&payload)
            .send()
            .await
            .map_err(|err| map_request_error(&err))?;

        decode(response).await
    }

    /// Dispatches `pending`, running at most one refresh-and-retry cycle.
    async fn send(&self, pending: &PendingRequest) -> Result<Response, ApiError> {
        let mut attempt = Attempt::First;
        let mut token = self.inner.tokens.get(TokenKind::Access);

        loop {
            let response = self.dispatch(pending, token.as_ref(), attempt).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            let Some(next) = attempt.next() else {
                debug!(url = %pending.url, "Unauthorized after token refresh");
                return Ok(response);
            };

            let Some(fresh) = self.renew_session(token.is_some()).await else {
                return Ok(response);
            };

            token = Some(fresh);
            attempt = next;
        }
    }

    async fn dispatch(
        &self,
        pending: &PendingRequest,
        token: Option<&SecretString>,
        attempt: Attempt,
    ) -> Result<Response, ApiError> {
        debug!(
            method = %pending.method,
            url = %pending.url,
            ?attempt,
            authenticated = token.is_some(),
            "Dispatching request"
        );

        let mut builder = self
            .inner
            .http
            .request(pending.method.clone(), &pending.url);

        if let Some(token) = token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(body) = &pending.body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(|err| map_request_error(&err))
    }

    /// Obtains a new access token after a 401. Returns `None` when the session
    /// cannot be recovered; in that case stored tokens are cleared and the login
    /// redirect fires if the failed request was authenticated.
    async fn renew_session(&self, had_access_token: bool) -> Option<SecretString> {
        let Some(refresh) = self.inner.tokens.get(TokenKind::Refresh) else {
            if had_access_token {
                self.end_session("no refresh token stored");
            }
            return None;
        };

        match self.refresh_access_token(&refresh).await {
            Ok(renewed) => {
                self.inner
                    .tokens
                    .set(TokenKind::Access, renewed.access.clone());
                if let Some(rotated) = renewed.refresh {
                    self.inner.tokens.set(TokenKind::Refresh, rotated);
                }
                info!("Access token refreshed");
                Some(renewed.access)
            }
            Err(err) => {
                warn!("Token refresh failed: {err}");
                self.end_session("refresh token rejected");
                None
            }
        }
    }

    fn end_session(&self, reason: &str) {
        self.inner.tokens.clear();
        error!(reason, "Session expired, redirecting to login");

        let hooks = self
            .inner
            .session_end_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for hook in hooks {
            hook();
        }

        self.inner.redirect.redirect_to_login();
    }

    fn url(&self, path: &str) -> String {
        build_url_with_base(&self.inner.base_url, path)
    }
}

/// Percent-encodes a caller-supplied value for use as one path segment.
#[must_use]
pub fn encode_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn normalize_base_url(raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|err| ApiError::Config(format!("Invalid API base URL '{trimmed}': {err}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.trim_end_matches('/').to_string()),
        scheme => Err(ApiError::Config(format!(
            "Invalid API base URL '{trimmed}': unsupported scheme {scheme}"
        ))),
    }
}

/// Joins a base URL and a path with exactly one slash between them.
fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

/// Decodes a success body as JSON, or turns an error status into `ApiError::Http`.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|err| map_request_error(&err))?;

    if !status.is_success() {
        return Err(ApiError::from_response(status, &body));
    }

    let decoded = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_value(Value::Null)
    } else {
        serde_json::from_slice(&body)
    };

    decoded.map_err(|err| ApiError::Parse(format!("Failed to decode response: {err}")))
}
