//! Session and token lifecycle management for the Lyrebird client.
//!
//! Provides:
//! - `SessionStore` - Authentication state, persistence, proactive renewal
//! - `SessionConfig` - Endpoint and timing knobs
//! - State store implementations (memory, file)

pub mod config;
pub mod storage;
pub mod store;

pub use config::SessionConfig;
pub use store::{RenewalError, SessionStore};
