//! Account endpoint wrappers.

use lyrebird_core::{UserProfile, traits::Method};
use serde_json::Value;

use crate::{
    client::{ApiClient, ApiError, RequestOptions},
    protocol::{
        ForgotPasswordRequest, LoginRequest, MessageReply, ProfileReply, RegenKeyReply,
        RegisterRequest, ResendVerificationRequest, ResetPasswordRequest, SessionGrant,
        TurnstileConfig, VerifyEmailRequest,
    },
};

/// Account endpoints of the service.
///
/// Obtained from [`ApiClient::auth`]. Sign-in and e-mail verification
/// store the issued credentials in the session store; sign-out clears
/// them.
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Create an account. The service sends a verification e-mail.
    ///
    /// # Errors
    /// `Api` with the service's validation payload on rejection.
    pub async fn register(&self, request: &RegisterRequest) -> Result<MessageReply, ApiError> {
        self.client
            .post_json("/auth/register", &serde_json::to_value(request)?)
            .await
    }

    /// Sign in. On success the issued credentials and profile are stored
    /// in the session.
    ///
    /// # Errors
    /// `Api` on rejected credentials or an unverified account.
    pub async fn login(&self, request: &LoginRequest) -> Result<SessionGrant, ApiError> {
        let grant: SessionGrant = self
            .client
            .post_json("/auth/login", &serde_json::to_value(request)?)
            .await?;
        self.store_grant(&grant);
        Ok(grant)
    }

    /// Sign out. The service invalidates the refresh token; local
    /// credentials are dropped regardless of the outcome.
    ///
    /// # Errors
    /// `Api` when the service rejects the call; the session is cleared
    /// either way.
    pub async fn logout(&self) -> Result<MessageReply, ApiError> {
        let result = self
            .client
            .json(Method::Post, "/auth/logout", None, RequestOptions::default())
            .await;
        self.client.session().clear();
        result
    }

    /// Fetch the signed-in user's profile and merge it into the session.
    ///
    /// # Errors
    /// `Api` when not signed in.
    pub async fn me(&self) -> Result<ProfileReply, ApiError> {
        let reply: ProfileReply = self.client.get_json("/auth/me").await?;
        self.client.session().update_user(&reply.user);
        Ok(reply)
    }

    /// Verify an e-mail address. Successful verification signs the user
    /// in with the returned credentials.
    ///
    /// # Errors
    /// `Api` on an invalid or expired verification token.
    pub async fn verify_email(&self, token: &str) -> Result<SessionGrant, ApiError> {
        let request = VerifyEmailRequest {
            token: token.to_string(),
        };
        let grant: SessionGrant = self
            .client
            .post_json("/auth/verify-email", &serde_json::to_value(&request)?)
            .await?;
        self.store_grant(&grant);
        Ok(grant)
    }

    /// Start the password reset flow.
    ///
    /// # Errors
    /// `Api` when the service rejects the call.
    pub async fn forgot_password(&self, email: &str) -> Result<MessageReply, ApiError> {
        let request = ForgotPasswordRequest {
            email: email.to_string(),
        };
        self.client
            .post_json("/auth/forgot-password", &serde_json::to_value(&request)?)
            .await
    }

    /// Complete the password reset flow with the e-mailed token.
    ///
    /// # Errors
    /// `Api` on an invalid or expired reset token.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<MessageReply, ApiError> {
        let request = ResetPasswordRequest {
            token: token.to_string(),
            new_password: new_password.to_string(),
        };
        self.client
            .post_json("/auth/reset-password", &serde_json::to_value(&request)?)
            .await
    }

    /// Re-send the verification e-mail.
    ///
    /// # Errors
    /// `Api` when the service rejects the call.
    pub async fn resend_verification(
        &self,
        email: &str,
        turnstile_token: Option<&str>,
    ) -> Result<MessageReply, ApiError> {
        let request = ResendVerificationRequest {
            email: email.to_string(),
            turnstile_token: turnstile_token.map(ToString::to_string),
        };
        self.client
            .post_json("/auth/resend-verification", &serde_json::to_value(&request)?)
            .await
    }

    /// Rotate the speech-API key. The fresh key replaces the held one.
    ///
    /// # Errors
    /// `Api` when not signed in.
    pub async fn regen_key(&self) -> Result<RegenKeyReply, ApiError> {
        let reply: RegenKeyReply = self
            .client
            .json(Method::Post, "/auth/regen-key", None, RequestOptions::default())
            .await?;

        let mut partial = UserProfile::new();
        partial.set("api_key", Value::String(reply.api_key.clone()));
        self.client.session().update_user(&partial);

        Ok(reply)
    }

    /// Captcha widget configuration for the public forms.
    ///
    /// # Errors
    /// `Api` when the service rejects the call.
    pub async fn turnstile_config(&self) -> Result<TurnstileConfig, ApiError> {
        self.client.get_json("/auth/turnstile-config").await
    }

    fn store_grant(&self, grant: &SessionGrant) {
        let api_key = grant
            .user
            .as_ref()
            .and_then(UserProfile::api_key)
            .map(ToString::to_string);
        self.client.session().set_authenticated(
            grant.access_token.clone(),
            Some(grant.refresh_token.clone()),
            grant.user.clone(),
            api_key,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use lyrebird_core::{
        SystemClock, Transport,
        traits::{TransportError, TransportRequest, TransportResponse},
    };
    use lyrebird_session::{SessionConfig, SessionStore, storage::MemoryStore};
    use serde_json::json;
    use tokio_test::assert_ok;
    use url::Url;

    use super::*;
    use crate::client::ApiConfig;

    struct ScriptedTransport {
        requests: Mutex<Vec<TransportRequest>>,
        responses: Mutex<VecDeque<TransportResponse>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<(u16, String)>) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|(status, body)| TransportResponse::new(status, body))
                        .collect(),
                ),
            })
        }

        fn request(&self, index: usize) -> TransportRequest {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn call(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TransportError::Network("script exhausted".to_string()))
        }
    }

    fn fixture(transport: &Arc<ScriptedTransport>) -> ApiClient {
        let session = Arc::new(SessionStore::new(
            SessionConfig::new(Url::parse("https://svc.test/api/v1/auth/refresh").unwrap()),
            Arc::new(MemoryStore::new()),
            transport.clone(),
            Arc::new(SystemClock),
        ));
        ApiClient::new(
            ApiConfig::new(Url::parse("https://svc.test").unwrap()),
            transport.clone(),
            session,
        )
    }

    fn grant_with_user() -> String {
        json!({
            "access_token": "token-1",
            "refresh_token": "refresh-1",
            "token_type": "bearer",
            "user": { "email": "a@b.c", "is_verified": true, "api_key": "lk_1" },
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_login_stores_credentials() {
        let transport = ScriptedTransport::new(vec![(200, grant_with_user())]);
        let client = fixture(&transport);

        let grant = assert_ok!(
            client
                .auth()
                .login(&LoginRequest {
                    email: "a@b.c".to_string(),
                    password: "hunter2".to_string(),
                    turnstile_token: None,
                })
                .await
        );

        assert_eq!(grant.access_token, "token-1");
        let session = client.session();
        assert!(session.is_authenticated());
        assert_eq!(session.access_token().as_deref(), Some("token-1"));
        assert_eq!(session.refresh_token().as_deref(), Some("refresh-1"));
        assert_eq!(session.api_key().as_deref(), Some("lk_1"));
        assert_eq!(session.user().unwrap().email(), Some("a@b.c"));

        assert_eq!(
            transport.request(0).url,
            "https://svc.test/api/v1/auth/login"
        );
    }

    #[tokio::test]
    async fn test_rejected_login_leaves_session_signed_out() {
        let transport = ScriptedTransport::new(vec![(
            401,
            r#"{"detail":"Invalid credentials"}"#.to_string(),
        )]);
        let client = fixture(&transport);

        let error = client
            .auth()
            .login(&LoginRequest {
                email: "a@b.c".to_string(),
                password: "wrong".to_string(),
                turnstile_token: None,
            })
            .await
            .unwrap_err();

        assert_eq!(error.payload_message(), Some("Invalid credentials"));
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_verify_email_signs_in() {
        let transport = ScriptedTransport::new(vec![(200, grant_with_user())]);
        let client = fixture(&transport);

        assert_ok!(client.auth().verify_email("verify-token").await);

        assert!(client.session().is_authenticated());
        assert_eq!(
            transport.request(0).body.unwrap()["token"],
            json!("verify-token")
        );
    }

    #[tokio::test]
    async fn test_logout_clears_session_even_when_rejected() {
        let transport = ScriptedTransport::new(vec![
            (200, grant_with_user()),
            (500, r#"{"detail":"boom"}"#.to_string()),
        ]);
        let client = fixture(&transport);

        assert_ok!(
            client
                .auth()
                .login(&LoginRequest {
                    email: "a@b.c".to_string(),
                    password: "hunter2".to_string(),
                    turnstile_token: None,
                })
                .await
        );

        let result = client.auth().logout().await;

        assert!(result.is_err());
        assert!(!client.session().is_authenticated());
        assert!(client.session().access_token().is_none());
    }

    #[tokio::test]
    async fn test_me_merges_profile_into_session() {
        let transport = ScriptedTransport::new(vec![
            (200, grant_with_user()),
            (
                200,
                json!({ "user": { "full_name": "Menura", "usage": { "requests": 5 } } })
                    .to_string(),
            ),
        ]);
        let client = fixture(&transport);

        assert_ok!(
            client
                .auth()
                .login(&LoginRequest {
                    email: "a@b.c".to_string(),
                    password: "hunter2".to_string(),
                    turnstile_token: None,
                })
                .await
        );
        assert_ok!(client.auth().me().await);

        let user = client.session().user().unwrap();
        assert_eq!(user.email(), Some("a@b.c"));
        assert_eq!(user.full_name(), Some("Menura"));
        assert_eq!(user.get("usage"), Some(&json!({ "requests": 5 })));
    }

    #[tokio::test]
    async fn test_regen_key_replaces_stored_key() {
        let transport = ScriptedTransport::new(vec![
            (200, grant_with_user()),
            (
                200,
                json!({ "api_key": "lk_2", "message": "rotated" }).to_string(),
            ),
        ]);
        let client = fixture(&transport);

        assert_ok!(
            client
                .auth()
                .login(&LoginRequest {
                    email: "a@b.c".to_string(),
                    password: "hunter2".to_string(),
                    turnstile_token: None,
                })
                .await
        );
        let reply = assert_ok!(client.auth().regen_key().await);

        assert_eq!(reply.api_key, "lk_2");
        assert_eq!(client.session().api_key().as_deref(), Some("lk_2"));
        assert_eq!(client.session().user().unwrap().api_key(), Some("lk_2"));
        // Rotation posts no body.
        assert!(transport.request(1).body.is_none());
    }

    #[tokio::test]
    async fn test_register_posts_wire_shape() {
        let transport = ScriptedTransport::new(vec![(
            200,
            json!({ "message": "check your e-mail" }).to_string(),
        )]);
        let client = fixture(&transport);

        assert_ok!(
            client
                .auth()
                .register(&RegisterRequest {
                    email: "a@b.c".to_string(),
                    password: "hunter2".to_string(),
                    full_name: None,
                    tos_accepted: true,
                    turnstile_token: None,
                })
                .await
        );

        let body = transport.request(0).body.unwrap();
        assert_eq!(body["tos_accepted"], json!(true));
        assert!(body.get("full_name").is_none());
    }

    #[tokio::test]
    async fn test_password_reset_round() {
        let transport = ScriptedTransport::new(vec![
            (200, json!({ "message": "sent" }).to_string()),
            (200, json!({ "message": "done" }).to_string()),
        ]);
        let client = fixture(&transport);

        assert_ok!(client.auth().forgot_password("a@b.c").await);
        assert_ok!(client.auth().reset_password("reset-token", "s3cret!").await);

        assert_eq!(transport.request(0).body.unwrap()["email"], json!("a@b.c"));
        let second = transport.request(1).body.unwrap();
        assert_eq!(second["token"], json!("reset-token"));
        assert_eq!(second["new_password"], json!("s3cret!"));
    }

    #[tokio::test]
    async fn test_turnstile_config_fetch() {
        let transport = ScriptedTransport::new(vec![(
            200,
            json!({ "enabled": true, "sitekey": "0xAAA" }).to_string(),
        )]);
        let client = fixture(&transport);

        let config = assert_ok!(client.auth().turnstile_config().await);
        assert!(config.enabled);
        assert_eq!(config.site_key.as_deref(), Some("0xAAA"));
    }
}
