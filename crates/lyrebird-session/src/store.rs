//! Client-side session store.
//!
//! Owns the authentication snapshot, keeps it in sync with the durable
//! store, proactively renews the access token before expiry and broadcasts
//! every state-changing mutation to subscribers.

use std::sync::{Arc, Mutex, RwLock};

use futures::{StreamExt, stream::BoxStream};
use lyrebird_core::{
    AuthState, Clock, SessionChange, SessionSnapshot, StateStore, Transport, UserProfile, token,
    traits::{Method, TransportRequest},
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;

use crate::SessionConfig;

/// Renewal error.
///
/// `Clone` so that every caller attached to a single in-flight exchange
/// receives the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenewalError {
    #[error("No refresh token held")]
    NoRefreshToken,
    #[error("Token exchange rejected with status {status}")]
    Rejected { status: u16 },
    #[error("Token exchange transport failure: {0}")]
    Transport(String),
    #[error("Token exchange returned an unusable grant: {0}")]
    BadGrant(String),
}

type RenewalOutcome = Result<(), RenewalError>;
type RenewalSlot = Mutex<Option<watch::Receiver<Option<RenewalOutcome>>>>;

/// Token pair returned by the exchange endpoint.
#[derive(Debug, Deserialize)]
struct RefreshGrant {
    access_token: String,
    refresh_token: String,
}

enum RenewalRole {
    /// This caller runs the exchange and publishes the outcome.
    Run(watch::Sender<Option<RenewalOutcome>>),
    /// An exchange is already in flight; attach to it.
    Attach(watch::Receiver<Option<RenewalOutcome>>),
}

/// Clears the pending-renewal slot even when the running caller is
/// dropped mid-exchange, so the next trigger starts fresh.
struct SlotGuard<'a> {
    slot: &'a RenewalSlot,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

/// Client-side session store.
///
/// All mutations go through this store: it is the sole writer of the
/// snapshot, persists after each mutation and notifies subscribers in
/// mutation order. Collaborators hold it behind [`Arc`].
pub struct SessionStore {
    config: SessionConfig,
    store: Arc<dyn StateStore>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    state: RwLock<SessionSnapshot>,
    events: broadcast::Sender<SessionChange>,
    renewal: RenewalSlot,
}

impl SessionStore {
    /// Create a session store in the signed-out state.
    ///
    /// Call [`restore`](Self::restore) once at startup to load persisted
    /// state, then [`spawn_watchdog`](Self::spawn_watchdog) to keep it
    /// evaluated.
    #[must_use]
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn StateStore>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            config,
            store,
            transport,
            clock,
            state: RwLock::new(SessionSnapshot::default()),
            events,
            renewal: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.read().unwrap().state
    }

    /// Held access token, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.state.read().unwrap().access_token.clone()
    }

    /// Held refresh token, if any.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.state.read().unwrap().refresh_token.clone()
    }

    /// Profile of the signed-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<UserProfile> {
        self.state.read().unwrap().user.clone()
    }

    /// Held speech-API key, if any.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        self.state.read().unwrap().api_key.clone()
    }

    /// Whether a signed-in user with a usable token is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.read().unwrap().is_authenticated()
    }

    /// Copy of the full snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.read().unwrap().clone()
    }

    /// Get a receiver for session change events.
    ///
    /// Events are sent before the mutating call returns, in mutation
    /// order. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }

    /// Stream of session change events.
    ///
    /// Lagging subscribers skip ahead rather than stall mutations.
    #[must_use]
    pub fn change_stream(&self) -> BoxStream<'static, SessionChange> {
        BroadcastStream::new(self.subscribe())
            .filter_map(|res| async move { res.ok() })
            .boxed()
    }

    /// Load persisted session state from the durable store.
    ///
    /// A missing record leaves the store signed out. A malformed or
    /// inconsistent record is discarded and cleared rather than surfaced.
    /// When the restored snapshot holds an access token, it is evaluated
    /// for expiry before this returns. Safe to call once at startup.
    pub async fn restore(&self) {
        let blob = match self.store.read(&self.config.storage_key) {
            Ok(Some(blob)) => blob,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Failed to read persisted session state: {e}");
                return;
            }
        };

        let snapshot: SessionSnapshot = match serde_json::from_str(&blob) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Discarding corrupted session state: {e}");
                self.clear();
                return;
            }
        };

        if !snapshot.is_consistent() {
            tracing::warn!("Discarding inconsistent session state");
            self.clear();
            return;
        }

        let held_token = snapshot.access_token.is_some();
        *self.state.write().unwrap() = snapshot;
        tracing::debug!(state = ?self.state(), "Restored session state");

        if held_token {
            self.evaluate_expiry().await;
        }
    }

    /// Store a full set of credentials after a successful sign-in.
    ///
    /// Replaces every field, persists the snapshot and notifies
    /// subscribers.
    pub fn set_authenticated(
        &self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        user: Option<UserProfile>,
        api_key: Option<String>,
    ) {
        let mut state = self.state.write().unwrap();
        *state = SessionSnapshot {
            state: AuthState::Authenticated,
            access_token: Some(access_token.into()),
            refresh_token,
            user,
            api_key,
        };
        self.persist(&state);
        // Sent under the write lock so event order matches mutation order.
        let _ = self.events.send(SessionChange::from(&*state));
    }

    /// Drop all credentials and return to the signed-out state.
    ///
    /// Deletes the persisted record and notifies subscribers. Store
    /// failures are logged, never surfaced.
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap();
        *state = SessionSnapshot::default();
        if let Err(e) = self.store.delete(&self.config.storage_key) {
            tracing::warn!("Failed to delete persisted session state: {e}");
        }
        let _ = self.events.send(SessionChange::from(&*state));
    }

    /// Apply a partial profile update to the signed-in user.
    ///
    /// No-op when no user is present. An `api_key` attribute in the
    /// partial also replaces the held secondary credential.
    pub fn update_user(&self, partial: &UserProfile) {
        let mut state = self.state.write().unwrap();
        let Some(user) = state.user.as_mut() else {
            return;
        };
        user.merge(partial);
        if let Some(key) = partial.api_key() {
            state.api_key = Some(key.to_string());
        }
        self.persist(&state);
        let _ = self.events.send(SessionChange::from(&*state));
    }

    /// Check the held access token against its embedded expiry and renew
    /// it once it is inside the renewal window.
    ///
    /// A structurally invalid token clears the session. A failed renewal
    /// marks the session expired; stale credentials are retained for
    /// display but no longer usable.
    pub async fn evaluate_expiry(&self) {
        let Some(access_token) = self.access_token() else {
            return;
        };

        let expires_at = match token::expiry_millis(&access_token) {
            Ok(millis) => millis,
            Err(e) => {
                tracing::warn!("Held access token is unreadable, clearing session: {e}");
                self.clear();
                return;
            }
        };

        let window = i64::try_from(self.config.renewal_window.as_millis()).unwrap_or(i64::MAX);
        if self.clock.now_millis() < expires_at.saturating_sub(window) {
            return;
        }

        tracing::debug!("Access token is inside the renewal window");
        if let Err(e) = self.renew().await {
            tracing::warn!("Session renewal failed: {e}");
            self.mark_expired();
        }
    }

    /// Exchange the refresh token for a fresh token pair.
    ///
    /// Single-flight: when an exchange is already in flight the caller
    /// attaches to it and receives the same outcome. On success both
    /// tokens are replaced, the state returns to authenticated, the
    /// snapshot is persisted and subscribers are notified. On failure
    /// nothing is mutated; the caller decides the consequence.
    ///
    /// # Errors
    /// Returns `RenewalError` when no refresh token is held, the service
    /// rejects the exchange or the transport fails.
    pub async fn renew(&self) -> Result<(), RenewalError> {
        let role = {
            let mut slot = self.renewal.lock().unwrap();
            match slot.as_ref() {
                Some(rx) => RenewalRole::Attach(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    *slot = Some(rx);
                    RenewalRole::Run(tx)
                }
            }
        };

        match role {
            RenewalRole::Run(tx) => {
                let guard = SlotGuard {
                    slot: &self.renewal,
                };
                let outcome = self.exchange_refresh_token().await;
                let _ = tx.send(Some(outcome.clone()));
                drop(guard);
                outcome
            }
            RenewalRole::Attach(mut rx) => loop {
                if let Some(outcome) = rx.borrow_and_update().clone() {
                    return outcome;
                }
                if rx.changed().await.is_err() {
                    return Err(RenewalError::Transport("renewal interrupted".to_string()));
                }
            },
        }
    }

    /// Spawn the background expiry watchdog.
    ///
    /// Re-evaluates the session every
    /// [`check_interval`](SessionConfig::check_interval) for the lifetime
    /// of the task. Abort the handle at teardown.
    pub fn spawn_watchdog(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(session.config.check_interval);
            loop {
                ticker.tick().await;
                session.evaluate_expiry().await;
            }
        })
    }

    async fn exchange_refresh_token(&self) -> Result<(), RenewalError> {
        let Some(refresh_token) = self.refresh_token() else {
            return Err(RenewalError::NoRefreshToken);
        };

        let mut request = TransportRequest::new(Method::Post, self.config.refresh_url.as_str())
            .with_body(json!({ "refresh_token": refresh_token }));
        request.push_header("Content-Type", "application/json");

        let call = self.transport.call(request);
        let response = match tokio::time::timeout(self.config.renewal_timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(RenewalError::Transport(e.to_string())),
            Err(_) => {
                return Err(RenewalError::Transport("token exchange timed out".to_string()));
            }
        };

        if !response.is_success() {
            return Err(RenewalError::Rejected {
                status: response.status,
            });
        }

        let grant: RefreshGrant = serde_json::from_str(&response.body)
            .map_err(|e| RenewalError::BadGrant(e.to_string()))?;

        {
            let mut state = self.state.write().unwrap();
            state.access_token = Some(grant.access_token);
            state.refresh_token = Some(grant.refresh_token);
            state.state = AuthState::Authenticated;
            self.persist(&state);
            let _ = self.events.send(SessionChange::from(&*state));
        }
        tracing::info!("Session renewed");

        Ok(())
    }

    fn mark_expired(&self) {
        let mut state = self.state.write().unwrap();
        state.state = AuthState::SessionExpired;
        self.persist(&state);
        let _ = self.events.send(SessionChange::from(&*state));
    }

    fn persist(&self, snapshot: &SessionSnapshot) {
        match serde_json::to_string(snapshot) {
            Ok(blob) => {
                if let Err(e) = self.store.write(&self.config.storage_key, &blob) {
                    tracing::warn!("Failed to persist session state: {e}");
                }
            }
            Err(e) => tracing::warn!("Failed to serialize session state: {e}"),
        }
    }
}
