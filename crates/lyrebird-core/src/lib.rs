//! Core abstractions for the Lyrebird speech service client.
//!
//! This crate provides the fundamental building blocks:
//! - `AuthState` / `SessionSnapshot` - Authentication state data model
//! - `UserProfile` - Profile attribute map with shallow merge
//! - `SessionChange` - Notification payload broadcast to subscribers
//! - Token expiry inspection
//! - `StateStore`, `Transport` and `Clock` traits

pub mod profile;
pub mod state;
pub mod token;
pub mod traits;

pub use profile::UserProfile;
pub use state::{AuthState, SessionChange, SessionSnapshot};
pub use traits::{Clock, StateStore, SystemClock, Transport};
