//! HTTP transport abstraction.
//!
//! Separates request signing from the network call so the client can be
//! exercised against a scripted transport in tests.

use std::collections::VecDeque;
use std::error::Error as _;
use std::pin::Pin;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Fully built POST request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    /// Header name/value pairs, in send order.
    pub headers: Vec<(String, String)>,
    /// Form-encoded body; also the signed message.
    pub body: String,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Final response after redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Set when the status arrived but the body could not be read in full.
    /// `body` is empty in that case.
    pub body_error: Option<String>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            body_error: None,
        }
    }

    /// Response whose body read failed after the status line was received.
    pub fn truncated(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: Vec::new(),
            body_error: Some(message.into()),
        }
    }
}

/// Failure before any HTTP response was received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Trait for sending signed requests.
pub trait HttpTransport: Send + Sync {
    /// POST the request and return the final response.
    fn post(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>>;
}

/// Arc wrapper for HttpTransport trait objects.
pub type DynHttpTransport = Arc<dyn HttpTransport>;

/// `reqwest`-backed transport.
///
/// TLS verification is on unless `accept_invalid_certs` is set.
pub struct ReqwestTransport {
    client: Client,
    accept_invalid_certs: bool,
}

impl ReqwestTransport {
    /// Build the underlying HTTP client from config.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        if config.accept_invalid_certs {
            warn!("TLS certificate verification disabled");
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .redirect(Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            accept_invalid_certs: config.accept_invalid_certs,
        })
    }

    /// Whether certificate verification was disabled at build time.
    #[must_use]
    pub fn accepts_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError(format!("invalid header name {name}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| TransportError(format!("invalid value for header {name}: {e}")))?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }
}

/// Flatten the error source chain into one description.
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl HttpTransport for ReqwestTransport {
    fn post(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            let headers = Self::header_map(&request.headers)?;

            let response = self
                .client
                .post(&request.url)
                .headers(headers)
                .body(request.body)
                .send()
                .await
                .map_err(|e| TransportError(describe(&e)))?;

            let status = response.status().as_u16();
            let final_url = response.url().to_string();
            let body = match response.bytes().await {
                Ok(body) => body,
                Err(e) => {
                    let message = format!("failed to read response body: {}", describe(&e));
                    warn!(status, url = %final_url, error = %message, "Response body truncated");
                    return Ok(HttpResponse::truncated(status, message));
                }
            };

            debug!(status, url = %final_url, bytes = body.len(), "HTTP response received");

            Ok(HttpResponse::new(status, body.to_vec()))
        })
    }
}

/// Scripted transport for testing.
///
/// Records every request and replays queued outcomes in order. When the
/// queue is empty it answers `200 {}`.
#[derive(Debug, Default)]
pub struct MockTransport {
    /// Recorded requests for verification.
    requests: parking_lot::Mutex<Vec<HttpRequest>>,
    /// Outcomes to return, front first.
    outcomes: parking_lot::Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn push_response(&self, status: u16, body: impl Into<Vec<u8>>) {
        self.outcomes
            .lock()
            .push_back(Ok(HttpResponse::new(status, body)));
    }

    /// Queue a response whose body could not be read.
    pub fn push_truncated(&self, status: u16, message: impl Into<String>) {
        self.outcomes
            .lock()
            .push_back(Ok(HttpResponse::truncated(status, message)));
    }

    /// Queue a transport failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.outcomes
            .lock()
            .push_back(Err(TransportError(message.into())));
    }

    /// Get recorded requests.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Most recent request, if any.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().last().cloned()
    }

    /// Clear recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }
}

impl HttpTransport for MockTransport {
    fn post(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            self.requests.lock().push(request);
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(200, "{}")))
        })
    }
}
