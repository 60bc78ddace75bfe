//! HTTP client for the Lyrebird speech service.
//!
//! Provides:
//! - `ApiClient` - Authorized request gateway with reactive renewal
//! - `AuthApi` - Typed account endpoint wrappers
//! - `HttpTransport` - reqwest-backed transport primitive

pub mod auth;
pub mod client;
pub mod protocol;
pub mod transport;

pub use auth::AuthApi;
pub use client::{ApiClient, ApiConfig, ApiError, RequestOptions};
pub use transport::HttpTransport;
