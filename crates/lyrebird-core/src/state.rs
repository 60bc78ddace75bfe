//! Authentication state data model.

use serde::{Deserialize, Serialize};

use crate::UserProfile;

/// Authentication lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No credentials are held.
    #[default]
    Unauthenticated,
    /// A signed-in user with a usable access token.
    Authenticated,
    /// Renewal failed; held credentials are stale and unusable.
    SessionExpired,
}

/// Full session state, both in memory and as the persisted record.
///
/// The default snapshot is the signed-out state with every field empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSnapshot {
    /// Current lifecycle state.
    pub state: AuthState,
    /// Bearer token attached to authorized calls.
    pub access_token: Option<String>,
    /// Long-lived token exchanged for fresh access tokens.
    pub refresh_token: Option<String>,
    /// Profile attributes of the signed-in user.
    pub user: Option<UserProfile>,
    /// Secondary credential for key-authenticated speech endpoints.
    pub api_key: Option<String>,
}

impl SessionSnapshot {
    /// Whether a signed-in user with a usable token is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated && self.access_token.is_some()
    }

    /// Whether the field set is consistent with the lifecycle state.
    ///
    /// An authenticated snapshot must hold an access token; a
    /// signed-out snapshot must hold no credentials at all. An expired
    /// snapshot may retain stale fields.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        match self.state {
            AuthState::Authenticated => self.access_token.is_some(),
            AuthState::Unauthenticated => {
                self.access_token.is_none()
                    && self.refresh_token.is_none()
                    && self.user.is_none()
                    && self.api_key.is_none()
            }
            AuthState::SessionExpired => true,
        }
    }
}

/// Notification payload broadcast to subscribers on each state-changing
/// mutation.
#[derive(Debug, Clone)]
pub struct SessionChange {
    /// Lifecycle state after the mutation.
    pub state: AuthState,
    /// User profile after the mutation.
    pub user: Option<UserProfile>,
    /// Secondary credential after the mutation.
    pub api_key: Option<String>,
}

impl From<&SessionSnapshot> for SessionChange {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            state: snapshot.state,
            user: snapshot.user.clone(),
            api_key: snapshot.api_key.clone(),
        }
    }
}
