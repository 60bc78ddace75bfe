//! Signs in against a running service and keeps the session alive.
//!
//! Run with: LYREBIRD_EMAIL=... LYREBIRD_PASSWORD=... cargo run -p session-watch-example
//!
//! `LYREBIRD_URL` overrides the service root (default http://localhost:8000).
//! Credentials persist under the platform data directory, so a second run
//! restores the session without signing in again.

use std::sync::Arc;

use anyhow::Context;
use lyrebird_api::{ApiClient, ApiConfig, HttpTransport, protocol::LoginRequest};
use lyrebird_core::SystemClock;
use lyrebird_session::{SessionConfig, SessionStore, storage::FileStore};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lyrebird_session=debug".into()),
        )
        .init();

    let base_url =
        std::env::var("LYREBIRD_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
    let email = std::env::var("LYREBIRD_EMAIL").context("LYREBIRD_EMAIL must be set")?;
    let password = std::env::var("LYREBIRD_PASSWORD").context("LYREBIRD_PASSWORD must be set")?;

    let api_config =
        ApiConfig::new(Url::parse(&base_url).context("LYREBIRD_URL is not a valid URL")?);
    let refresh_url = Url::parse(&api_config.endpoint("/auth/refresh"))?;

    let transport = Arc::new(HttpTransport::new());
    let session = Arc::new(SessionStore::new(
        SessionConfig::new(refresh_url),
        Arc::new(FileStore::for_app("lyrebird")),
        transport.clone(),
        Arc::new(SystemClock),
    ));

    // Pick up credentials from a previous run, renewing if they are stale
    session.restore().await;

    // Log every session change
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(change) = events.recv().await {
            info!(state = ?change.state, "Session changed");
        }
    });

    let watchdog = session.spawn_watchdog();

    let client = ApiClient::new(api_config, transport, session.clone());
    if session.is_authenticated() {
        info!("Restored session from disk");
    } else {
        client
            .auth()
            .login(&LoginRequest {
                email,
                password,
                turnstile_token: None,
            })
            .await
            .context("Sign-in failed")?;
        info!("Signed in");
    }

    let profile = client.auth().me().await.context("Profile fetch failed")?;
    info!(
        email = profile.user.email().unwrap_or("<unknown>"),
        verified = profile.user.is_verified(),
        "Watching session; press Ctrl+C to exit"
    );

    tokio::signal::ctrl_c().await?;
    watchdog.abort();
    Ok(())
}
