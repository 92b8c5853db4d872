//! Transport contract and the reqwest-backed HTTP implementation
//!
//! The dispatch layer talks to the backend through the narrow [`Transport`]
//! seam: one `send` taking a method, a rendered path, and the optional
//! query/body/headers. The transport performs no classification of HTTP-level
//! failures; it returns every received response (whatever the status) and
//! reserves its own errors for connection-level failures that never produced
//! a status code. Timeouts are the transport's concern; the dispatch core
//! never retries.

use crate::error::{ClientError, ErrorDetails};
use crate::operations::Method;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Optional request inputs forwarded verbatim to the backend.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
}

/// A received backend response: status code plus decoded payload.
///
/// Empty bodies (204, HEAD) decode to [`Value::Null`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub payload: Value,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Narrow contract between the dispatch core and the wire.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the received response.
    ///
    /// `Err` is reserved for failures where no response arrived at all
    /// (connection refused, timeout); HTTP error statuses come back as
    /// `Ok(Response)` for the dispatch layer to classify.
    async fn send(
        &self,
        method: Method,
        path: &str,
        parts: RequestParts,
    ) -> Result<Response, ClientError>;
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransportConfig {
    /// Backend base URL, e.g. `https://api.example.com/v1`. A trailing slash
    /// is trimmed so rendered paths join cleanly.
    pub base_url: String,
    /// Static bearer token sent as `Authorization: Bearer <token>`.
    pub bearer_token: Option<String>,
    /// Per-request timeout; `None` leaves reqwest's default in place.
    pub timeout: Option<Duration>,
    /// Headers applied to every request; per-call headers override these.
    pub default_headers: BTreeMap<String, String>,
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    default_headers: BTreeMap<String, String>,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| ClientError::Http {
            message: format!("Failed to build HTTP client: {e}"),
            details: ErrorDetails::for_operation("transport_init"),
        })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token,
            default_headers: config.default_headers,
        })
    }

    fn reqwest_method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        parts: RequestParts,
    ) -> Result<Response, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(Self::reqwest_method(method), &url);

        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        // Defaults first so per-call headers win.
        let mut headers = self.default_headers.clone();
        headers.extend(parts.headers);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }

        if !parts.query.is_empty() {
            request = request.query(&parts.query);
        }
        if let Some(body) = &parts.body {
            request = request.json(body);
        }

        debug!(%method, %url, "sending request");
        let response = request.send().await.map_err(|e| ClientError::Http {
            message: format!("Request failed: {e}"),
            details: ErrorDetails::for_operation("http_send")
                .context("method", method.as_str())
                .context("url", url.clone()),
        })?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| ClientError::Http {
            message: format!("Failed to read response body: {e}"),
            details: ErrorDetails::for_operation("http_send")
                .status(status)
                .context("url", url),
        })?;

        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            // Non-JSON bodies are preserved as a string payload rather than
            // dropped, so error classification still sees them.
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Ok(Response { status, payload })
    }
}
