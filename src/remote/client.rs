//! Authenticated REST client for one remote store.

use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::RemoteError;
use super::throttle::RequestThrottle;

const API_PREFIX: &str = "wp-json/wc/v3";

/// Connection details taken from the store record.
#[derive(Clone)]
pub struct Credentials {
    pub base_url: String,
    pub key: String,
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Transport settings shared by every store client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub min_interval: Duration,
    /// Skip TLS certificate validation (self-signed shops). Off unless configured.
    pub accept_invalid_certs: bool,
    /// Send key/secret as query parameters even over HTTPS.
    pub query_string_auth: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            min_interval: Duration::from_millis(250),
            accept_invalid_certs: false,
            query_string_auth: false,
        }
    }
}

/// Decoded response plus the pagination hints the platform sends.
#[derive(Debug, Clone)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Value,
    pub total: Option<u64>,
    pub total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

pub struct RemoteClient {
    http: Client,
    api_root: String,
    credentials: Credentials,
    query_auth: bool,
    throttle: RequestThrottle,
}

impl RemoteClient {
    pub fn new(credentials: Credentials, options: &ClientOptions) -> Result<Self, RemoteError> {
        if options.accept_invalid_certs {
            warn!(base_url = %credentials.base_url, "TLS certificate validation disabled for remote store");
        }

        let http = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .user_agent(concat!("opensase-storesync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Transport(format!("failed to build HTTP client: {e}")))?;

        let base = credentials.base_url.trim().trim_end_matches('/').to_string();
        let query_auth = options.query_string_auth || base.starts_with("http://");

        Ok(Self {
            http,
            api_root: format!("{base}/{API_PREFIX}"),
            credentials,
            query_auth,
            throttle: RequestThrottle::new(options.min_interval),
        })
    }

    pub fn api_root(&self) -> &str { &self.api_root }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<RemoteResponse, RemoteError> {
        self.send(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<RemoteResponse, RemoteError> {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<RemoteResponse, RemoteError> {
        self.send(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<RemoteResponse, RemoteError> {
        self.send(Method::DELETE, path, &[("force", "true".to_string())], None).await
    }

    async fn send(&self, method: Method, path: &str, query: &[(&str, String)], body: Option<&Value>) -> Result<RemoteResponse, RemoteError> {
        self.throttle.acquire().await;

        let url = format!("{}/{}", self.api_root, path.trim_start_matches('/'));
        debug!(%method, %url, "remote request");

        let mut request = self.http.request(method, &url).query(query);
        request = if self.query_auth {
            request.query(&[
                ("consumer_key", self.credentials.key.as_str()),
                ("consumer_secret", self.credentials.secret.as_str()),
            ])
        } else {
            request.basic_auth(&self.credentials.key, Some(&self.credentials.secret))
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(RemoteError::from_reqwest)?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(RemoteError::from_reqwest)?;

        if !status.is_success() {
            return Err(classify(status, &headers, &text));
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| RemoteError::Decode(format!("{url}: {e}")))?
        };

        Ok(RemoteResponse {
            status: status.as_u16(),
            body,
            total: header_number(&headers, "x-wp-total"),
            total_pages: header_number(&headers, "x-wp-totalpages"),
        })
    }
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

fn classify(status: StatusCode, headers: &HeaderMap, text: &str) -> RemoteError {
    let parsed: Option<ErrorBody> = serde_json::from_str(text).ok();
    let code = parsed.as_ref().and_then(|b| b.code.clone());
    let message = parsed
        .and_then(|b| b.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

    match status.as_u16() {
        401 | 403 => RemoteError::Auth { status: status.as_u16(), message },
        429 => RemoteError::RateLimit {
            retry_after: header_number::<u64>(headers, "retry-after").map(Duration::from_secs),
        },
        404 => RemoteError::NotFound(message),
        400..=499 => RemoteError::Validation { status: status.as_u16(), code, message },
        _ => RemoteError::Transport(format!("remote returned {status}: {message}")),
    }
}
