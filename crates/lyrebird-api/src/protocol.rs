//! Wire types for the service's account endpoints.

use lyrebird_core::UserProfile;
use serde::{Deserialize, Serialize};

/// Sign-up request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub tos_accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnstile_token: Option<String>,
}

/// Sign-in request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnstile_token: Option<String>,
}

/// E-mail verification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// Password reset start request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Password reset completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Verification e-mail re-send request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnstile_token: Option<String>,
}

/// Token pair issued on sign-in, e-mail verification and renewal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionGrant {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Present on sign-in and e-mail verification, absent on renewal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Plain acknowledgement payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReply {
    pub message: String,
}

/// Profile payload of the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileReply {
    pub user: UserProfile,
}

/// Fresh speech-API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenKeyReply {
    pub api_key: String,
    pub message: String,
}

/// Captcha widget configuration for the public forms.
///
/// The service names the key field `sitekey`, after the attribute the
/// Turnstile widget itself takes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnstileConfig {
    pub enabled: bool,
    #[serde(default, rename = "sitekey", skip_serializing_if = "Option::is_none")]
    pub site_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_optional_fields_are_omitted() {
        let request = LoginRequest {
            email: "a@b.c".to_string(),
            password: "hunter2".to_string(),
            turnstile_token: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({ "email": "a@b.c", "password": "hunter2" }));
    }

    #[test]
    fn test_register_carries_tos_flag() {
        let request = RegisterRequest {
            email: "a@b.c".to_string(),
            password: "hunter2".to_string(),
            full_name: Some("Menura".to_string()),
            tos_accepted: true,
            turnstile_token: Some("cf-token".to_string()),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["tos_accepted"], json!(true));
        assert_eq!(value["full_name"], json!("Menura"));
        assert_eq!(value["turnstile_token"], json!("cf-token"));
    }

    #[test]
    fn test_grant_parses_service_shape() {
        let grant: SessionGrant = serde_json::from_value(json!({
            "access_token": "a.b.c",
            "refresh_token": "r",
            "token_type": "bearer",
            "user": { "email": "a@b.c", "is_verified": true, "api_key": "lk_1" },
        }))
        .unwrap();

        assert_eq!(grant.token_type, "bearer");
        assert_eq!(grant.user.unwrap().api_key(), Some("lk_1"));
    }

    #[test]
    fn test_turnstile_config_reads_sitekey_field() {
        let config: TurnstileConfig = serde_json::from_value(json!({
            "enabled": true,
            "sitekey": "0x4AAA",
        }))
        .unwrap();

        assert!(config.enabled);
        assert_eq!(config.site_key.as_deref(), Some("0x4AAA"));
    }

    #[test]
    fn test_grant_without_user_defaults_token_type() {
        let grant: SessionGrant = serde_json::from_value(json!({
            "access_token": "a.b.c",
            "refresh_token": "r",
        }))
        .unwrap();

        assert_eq!(grant.token_type, "bearer");
        assert!(grant.user.is_none());
    }
}
