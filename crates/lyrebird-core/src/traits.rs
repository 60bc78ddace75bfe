//! Trait seams for storage, transport and time.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Storage error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store error: {0}")]
    Internal(String),
}

/// Durable key/value record store for session state.
///
/// One logical record per key. Implementations must tolerate concurrent
/// readers; the session layer serializes writers.
pub trait StateStore: Send + Sync {
    /// Read the record stored under `key`. A missing record is `Ok(None)`.
    ///
    /// # Errors
    /// Returns `StoreError` when the medium fails.
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write the record stored under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns `StoreError` when the medium fails.
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete the record stored under `key`, if present.
    ///
    /// # Errors
    /// Returns `StoreError` when the medium fails.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Clock seam, injected so expiry logic is testable.
pub trait Clock: Send + Sync {
    /// Current time as unix milliseconds.
    fn now_millis(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    }
}

/// HTTP method of a transport request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Outbound request handed to the transport primitive.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs, in send order.
    pub headers: Vec<(String, String)>,
    /// JSON body, when the call carries one.
    pub body: Option<Value>,
}

impl TransportRequest {
    /// Create a request with no headers and no body.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append a header.
    pub fn push_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// First value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response produced by the transport primitive.
///
/// Any well-formed HTTP response lands here, success or not; only
/// network-level failure is an error.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Header name/value pairs, in receive order.
    pub headers: Vec<(String, String)>,
    /// Raw response body.
    pub body: String,
}

impl TransportResponse {
    /// Create a response with no headers.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// First value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport error.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Trait for the HTTP transport primitive.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a single HTTP request.
    ///
    /// # Errors
    /// Returns `TransportError` only for network-level failure; non-success
    /// statuses come back as responses.
    async fn call(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut request = TransportRequest::new(Method::Get, "https://svc.test/api/v1/auth/me");
        request.push_header("Authorization", "Bearer abc");

        assert_eq!(request.header("authorization"), Some("Bearer abc"));
        assert_eq!(request.header("X-API-Key"), None);
    }

    #[test]
    fn test_response_header_lookup_is_case_insensitive() {
        let mut response = TransportResponse::new(200, "{}");
        response
            .headers
            .push(("Content-Type".to_string(), "application/json".to_string()));

        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("Retry-After"), None);
    }

    #[test]
    fn test_success_range() {
        let ok = TransportResponse::new(204, "");
        let unauthorized = TransportResponse::new(401, "");
        assert!(ok.is_success());
        assert!(!unauthorized.is_success());
    }
}
