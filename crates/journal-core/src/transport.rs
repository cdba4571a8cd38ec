//! One HTTP round trip, mapped to a typed outcome.
//!
//! Transport-level failures are surfaced as `JournalError::Network` and never
//! retried here. Non-2xx statuses map onto the failure kinds of `JournalError`.

use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::{BoxError, JournalError, Result};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const SERVICE_INACTIVE: &str = "service_inactive";

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn post_json(url: Url, body: Vec<u8>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        Self {
            method: Method::POST,
            url,
            headers,
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// Raw request/response capability. Implementations must report I/O
/// failures as errors rather than synthesizing a response.
pub trait HttpBackend: Send + Sync {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, BoxError>;
}

#[derive(Clone)]
pub enum Auth {
    Token(String),
    Basic { user: String, password: String },
}

impl Auth {
    fn header_value(&self) -> Result<HeaderValue> {
        let raw = match self {
            Auth::Token(token) => format!("Token {token}"),
            Auth::Basic { user, password } => format!(
                "Basic {}",
                general_purpose::STANDARD.encode(format!("{user}:{password}"))
            ),
        };
        let mut value = HeaderValue::from_str(&raw).map_err(|_| {
            JournalError::Config("credentials contain invalid header characters".into())
        })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Token(_) => f.write_str("Token(<redacted>)"),
            Auth::Basic { user, .. } => {
                write!(f, "Basic {{ user: {user:?}, password: <redacted> }}")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub auth: Option<Auth>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: default_user_agent(),
            auth: None,
        }
    }
}

pub fn default_user_agent() -> String {
    format!("journal-core/{}", env!("CARGO_PKG_VERSION"))
}

/// Blocking reqwest client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ReqwestBackend {
    client: reqwest::blocking::Client,
}

impl ReqwestBackend {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(|e| JournalError::Config(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpBackend for ReqwestBackend {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, BoxError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send()?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes()?.to_vec();
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[derive(Clone)]
pub struct Transport {
    backend: Arc<dyn HttpBackend>,
    auth: Option<HeaderValue>,
}

impl Transport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let backend = ReqwestBackend::new(config)?;
        Self::with_backend(Arc::new(backend), config.auth.as_ref())
    }

    pub fn with_backend(backend: Arc<dyn HttpBackend>, auth: Option<&Auth>) -> Result<Self> {
        let auth = auth.map(Auth::header_value).transpose()?;
        Ok(Self { backend, auth })
    }

    pub fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        if let Some(auth) = &self.auth {
            request.headers.insert(AUTHORIZATION, auth.clone());
        }
        let method = request.method.clone();
        let url = request.url.clone();
        let body_len = request.body.as_ref().map_or(0, Vec::len);
        debug!(%method, %url, body_len, "sending request");

        let response = self.backend.send(request).map_err(|source| {
            error!(%method, %url, error = %source, "failed while connecting to server");
            JournalError::Network(source)
        })?;
        check_status(response)
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("authenticated", &self.auth.is_some())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    detail: String,
}

/// Pass 2xx responses through; map everything else to its failure kind.
pub fn check_status(response: HttpResponse) -> Result<HttpResponse> {
    let status = response.status;
    if status.is_success() {
        return Ok(response);
    }
    let err = match status {
        StatusCode::SERVICE_UNAVAILABLE => JournalError::ServiceUnavailable {
            retry_after: retry_after_secs(&response.headers),
        },
        StatusCode::UNAUTHORIZED => JournalError::Unauthorized,
        StatusCode::FORBIDDEN => match serde_json::from_slice::<ApiError>(&response.body) {
            Ok(api) if api.code == SERVICE_INACTIVE => JournalError::UserInactive(api.detail),
            _ => http_error(&response),
        },
        _ => http_error(&response),
    };
    warn!(status = status.as_u16(), error = %err, "request rejected by server");
    Err(err)
}

fn http_error(response: &HttpResponse) -> JournalError {
    JournalError::Http {
        status: response.status.as_u16(),
        body: String::from_utf8_lossy(&response.body).into_owned(),
    }
}

fn retry_after_secs(headers: &HeaderMap) -> u64 {
    let Some(value) = headers.get(RETRY_AFTER) else {
        return 0;
    };
    match value.to_str().ok().and_then(|v| v.trim().parse::<u64>().ok()) {
        Some(secs) => secs,
        None => {
            warn!(?value, "unparseable Retry-After header; using 0");
            0
        }
    }
}
