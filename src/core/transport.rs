//! HTTP Transport
//!
//! HTTP client interface and implementations for token and report requests.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use url::Url;

use crate::error::{ConfigurationError, NetworkError, ProtocolError, ReportsError};

/// HTTP request definition.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Fully resolved request URL, query included.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Option<String>,
    /// Request timeout.
    pub timeout: Option<Duration>,
}

/// HTTP method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = ReportsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            _ => Err(ConfigurationError::InvalidValue {
                field: "method".to_string(),
                message: format!("unsupported HTTP method {s:?}"),
            }
            .into()),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }
}

/// HTTP response definition. The body is never interpreted by the transport.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
    /// URL the response was received from.
    pub url: String,
}

impl HttpResponse {
    /// Create an empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            url: String::new(),
        }
    }

    /// Add a header. Names or values that are not valid HTTP are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Set a raw body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body and content type.
    pub fn with_json(mut self, value: &serde_json::Value) -> Self {
        self.body = Bytes::from(value.to_string());
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ReportsError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ReportsError::Protocol(ProtocolError::InvalidJson {
                message: e.to_string(),
            })
        })
    }
}

/// HTTP transport interface (for dependency injection).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request. Exactly one network attempt per call.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ReportsError>;
}

/// Default reqwest-based HTTP transport.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl ReqwestHttpTransport {
    /// Create new transport with default settings.
    pub fn new() -> Result<Self, ReportsError> {
        Self::with_timeout(crate::types::DEFAULT_TIMEOUT)
    }

    /// Create transport with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ReportsError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                ReportsError::Configuration(ConfigurationError::InvalidValue {
                    field: "http_client".to_string(),
                    message: e.to_string(),
                })
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }
}

/// Failure classes reported by a reqwest error.
#[derive(Debug, Clone, Copy, Default)]
struct FailureKind {
    builder: bool,
    connect: bool,
    timeout: bool,
    body: bool,
    request: bool,
}

impl From<&reqwest::Error> for FailureKind {
    fn from(error: &reqwest::Error) -> Self {
        Self {
            builder: error.is_builder(),
            connect: error.is_connect(),
            timeout: error.is_timeout(),
            body: error.is_body() || error.is_decode(),
            request: error.is_request(),
        }
    }
}

/// Map a failure onto the transport taxonomy.
///
/// reqwest flags a connect timeout as both `connect` and `timeout`; only a
/// timeout after the connection is up maps to the retryable `Timeout`.
fn classify_failure(kind: FailureKind, message: String, timeout: Duration) -> NetworkError {
    if kind.builder {
        NetworkError::InvalidRequest { message }
    } else if kind.connect && kind.timeout {
        NetworkError::ConnectTimeout { timeout }
    } else if kind.timeout {
        NetworkError::Timeout { timeout }
    } else if kind.connect {
        NetworkError::ConnectionFailed { message }
    } else if kind.body {
        NetworkError::Protocol { message }
    } else if kind.request {
        NetworkError::WriteFailed { message }
    } else {
        NetworkError::Other { message }
    }
}

fn map_reqwest_error(error: reqwest::Error, timeout: Duration) -> ReportsError {
    let kind = FailureKind::from(&error);
    ReportsError::Network(classify_failure(kind, error.to_string(), timeout))
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ReportsError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut builder = self
            .client
            .request(request.method.into(), request.url)
            .headers(request.headers)
            .timeout(timeout);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().to_string();

        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
            url,
        })
    }
}

type MockHandler = dyn Fn(&HttpRequest, usize) -> Result<HttpResponse, ReportsError> + Send + Sync;

/// Mock HTTP transport for testing.
///
/// Replays queued outcomes in FIFO order, or delegates every call to a
/// handler that receives the request and its zero-based call index.
#[derive(Default)]
pub struct MockHttpTransport {
    outcomes: Mutex<VecDeque<Result<HttpResponse, ReportsError>>>,
    handler: Option<Box<MockHandler>>,
    request_history: Mutex<Vec<HttpRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockHttpTransport {
    /// Create new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock transport driven by a handler.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest, usize) -> Result<HttpResponse, ReportsError> + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::default()
        }
    }

    /// Queue a response to return.
    pub fn queue_response(&self, response: HttpResponse) -> &Self {
        lock(&self.outcomes).push_back(Ok(response));
        self
    }

    /// Queue a JSON response.
    pub fn queue_json_response(&self, status: u16, body: &serde_json::Value) -> &Self {
        self.queue_response(HttpResponse::new(status).with_json(body))
    }

    /// Queue a transport failure.
    pub fn queue_error(&self, error: ReportsError) -> &Self {
        lock(&self.outcomes).push_back(Err(error));
        self
    }

    /// Get request history.
    pub fn get_requests(&self) -> Vec<HttpRequest> {
        lock(&self.request_history).clone()
    }

    /// Get last request.
    pub fn get_last_request(&self) -> Option<HttpRequest> {
        lock(&self.request_history).last().cloned()
    }

    /// Number of requests sent so far.
    pub fn request_count(&self) -> usize {
        lock(&self.request_history).len()
    }

    /// Clear request history.
    pub fn clear_history(&self) {
        lock(&self.request_history).clear();
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ReportsError> {
        let index = {
            let mut history = lock(&self.request_history);
            history.push(request.clone());
            history.len() - 1
        };

        let outcome = match &self.handler {
            Some(handler) => handler(&request, index),
            None => lock(&self.outcomes).pop_front().unwrap_or_else(|| {
                Err(ReportsError::Network(NetworkError::Other {
                    message: "No mock response available".to_string(),
                }))
            }),
        };

        outcome.map(|mut response| {
            if response.url.is_empty() {
                response.url = request.url.to_string();
            }
            response
        })
    }
}
