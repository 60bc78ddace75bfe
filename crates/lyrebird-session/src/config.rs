//! Session store configuration.

use std::time::Duration;

use url::Url;

/// Configuration for [`SessionStore`](crate::SessionStore).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Token exchange endpoint.
    pub refresh_url: Url,
    /// Durable-store record key.
    pub storage_key: String,
    /// Renew once the access token expires within this window.
    pub renewal_window: Duration,
    /// Period of the background expiry check.
    pub check_interval: Duration,
    /// Upper bound on a single token exchange.
    pub renewal_timeout: Duration,
}

impl SessionConfig {
    /// Create a config with default windows for the given exchange endpoint.
    #[must_use]
    pub fn new(refresh_url: Url) -> Self {
        Self {
            refresh_url,
            storage_key: "lyrebird_session".to_string(),
            renewal_window: Duration::from_secs(60),
            check_interval: Duration::from_secs(60),
            renewal_timeout: Duration::from_secs(30),
        }
    }

    /// Use a different durable-store record key.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Use a different renewal window.
    #[must_use]
    pub fn with_renewal_window(mut self, window: Duration) -> Self {
        self.renewal_window = window;
        self
    }

    /// Use a different background check period.
    #[must_use]
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Use a different token exchange timeout.
    #[must_use]
    pub fn with_renewal_timeout(mut self, timeout: Duration) -> Self {
        self.renewal_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config =
            SessionConfig::new(Url::parse("https://svc.test/api/v1/auth/refresh").unwrap());
        assert_eq!(config.storage_key, "lyrebird_session");
        assert_eq!(config.renewal_window, Duration::from_secs(60));
        assert_eq!(config.check_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_builder_overrides() {
        let config =
            SessionConfig::new(Url::parse("https://svc.test/api/v1/auth/refresh").unwrap())
                .with_storage_key("test_session")
                .with_renewal_window(Duration::from_secs(10))
                .with_check_interval(Duration::from_secs(1))
                .with_renewal_timeout(Duration::from_millis(50));

        assert_eq!(config.storage_key, "test_session");
        assert_eq!(config.renewal_window, Duration::from_secs(10));
        assert_eq!(config.check_interval, Duration::from_secs(1));
        assert_eq!(config.renewal_timeout, Duration::from_millis(50));
    }
}
