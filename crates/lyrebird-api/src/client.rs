//! Authorized request gateway.

use std::sync::Arc;

use lyrebird_core::traits::{Method, Transport, TransportError, TransportRequest, TransportResponse};
use lyrebird_session::SessionStore;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

use crate::auth::AuthApi;

/// Versioned prefix all API paths are issued under.
const API_PREFIX: &str = "/api/v1";

/// Gateway error.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level failure; the call may never have reached the service.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    /// Well-formed non-success response from the service.
    #[error("API error (status {status})")]
    Api { status: u16, payload: Value },
    /// Renewal after an unauthorized response failed; the session was
    /// cleared and the user must sign in again.
    #[error("Session terminated")]
    SessionTerminated,
    /// Request or response JSON did not match the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Human-readable message dug out of the service's error payload.
    ///
    /// The service nests validation details under `detail`; plain
    /// `message` payloads and bare string details are handled too.
    #[must_use]
    pub fn payload_message(&self) -> Option<&str> {
        let Self::Api { payload, .. } = self else {
            return None;
        };
        let detail = payload.get("detail").unwrap_or(payload);
        detail
            .get("message")
            .or_else(|| detail.get("error"))
            .and_then(Value::as_str)
            .or_else(|| detail.as_str())
    }
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    base_url: Url,
}

impl ApiConfig {
    /// Create a config for a service root such as `https://speech.example.com`.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    /// Absolute URL for an API path such as `/auth/login`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{API_PREFIX}{path}",
            self.base_url.as_str().trim_end_matches('/')
        )
    }
}

/// Per-call options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    /// Attach the speech-API key header in addition to the bearer token.
    pub use_api_key: bool,
}

/// Authorized request gateway.
///
/// Attaches held credentials to outbound calls and coordinates reactive
/// renewal: an unauthorized response triggers exactly one renewal and one
/// retry; when renewal fails the session is cleared and the call resolves
/// to [`ApiError::SessionTerminated`].
pub struct ApiClient {
    config: ApiConfig,
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
}

impl ApiClient {
    /// Create a gateway over the given transport and session store.
    #[must_use]
    pub fn new(
        config: ApiConfig,
        transport: Arc<dyn Transport>,
        session: Arc<SessionStore>,
    ) -> Self {
        Self {
            config,
            transport,
            session,
        }
    }

    /// Session store this gateway attaches credentials from.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Account endpoint wrappers.
    #[must_use]
    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    /// Issue an authorized call and return the raw response.
    ///
    /// Any well-formed response, success or not, is returned as-is; the
    /// single reactive retry after an unauthorized response is the only
    /// reissue this gateway ever performs.
    ///
    /// # Errors
    /// `Transport` on network failure, `SessionTerminated` when an
    /// unauthorized response could not be recovered by renewal.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<TransportResponse, ApiError> {
        let (request, bearer) = self.build_request(method, path, body, options);
        let response = self.transport.call(request).await?;

        // Expired-token recovery is skipped for the auth endpoints
        // themselves: a rejected sign-in must not trigger renewal.
        if response.status == 401 && bearer && !path.starts_with("/auth/") {
            tracing::debug!("Unauthorized response for {path}, renewing session");
            if self.session.renew().await.is_err() {
                self.session.clear();
                return Err(ApiError::SessionTerminated);
            }
            let (retry, _) = self.build_request(method, path, body, options);
            return Ok(self.transport.call(retry).await?);
        }

        Ok(response)
    }

    /// Issue a call and decode a JSON success body.
    ///
    /// # Errors
    /// `Api` carries the parsed error payload for non-success statuses,
    /// falling back to a plain message when the body is not JSON.
    pub async fn json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let response = self.request(method, path, body, options).await?;
        if !response.is_success() {
            return Err(ApiError::Api {
                status: response.status,
                payload: error_payload(&response),
            });
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    /// GET a JSON endpoint.
    ///
    /// # Errors
    /// See [`json`](Self::json).
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.json(Method::Get, path, None, RequestOptions::default())
            .await
    }

    /// POST a JSON body and decode the reply.
    ///
    /// # Errors
    /// See [`json`](Self::json).
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, ApiError> {
        self.json(Method::Post, path, Some(body), RequestOptions::default())
            .await
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> (TransportRequest, bool) {
        let mut request = TransportRequest::new(method, self.config.endpoint(path));
        request.push_header("Content-Type", "application/json");

        let mut bearer = false;
        if let Some(token) = self.session.access_token() {
            request.push_header("Authorization", format!("Bearer {token}"));
            bearer = true;
        }
        if options.use_api_key {
            if let Some(key) = self.session.api_key() {
                request.push_header("X-API-Key", key);
            }
        }
        if let Some(body) = body {
            request = request.with_body(body.clone());
        }
        (request, bearer)
    }
}

fn error_payload(response: &TransportResponse) -> Value {
    serde_json::from_str(&response.body)
        .unwrap_or_else(|_| json!({ "message": format!("HTTP {}", response.status) }))
}
