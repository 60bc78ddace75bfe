//! User profile attributes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Profile attributes of the signed-in user.
///
/// The service returns a JSON object whose field set evolves server-side;
/// the client keeps the whole object and exposes typed accessors for the
/// fields it renders. Partial updates are applied with [`merge`](Self::merge).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile {
    fields: Map<String, Value>,
}

impl UserProfile {
    /// Create an empty profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an attribute by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set an attribute.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Shallow-merge `partial` into this profile.
    ///
    /// Top-level fields present in the partial replace the held values;
    /// all other fields are retained.
    pub fn merge(&mut self, partial: &Self) {
        for (key, value) in &partial.fields {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Account e-mail address.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.str_field("email")
    }

    /// Display name, when the user has set one.
    #[must_use]
    pub fn full_name(&self) -> Option<&str> {
        self.str_field("full_name")
    }

    /// Account creation timestamp as reported by the service.
    #[must_use]
    pub fn created_at(&self) -> Option<&str> {
        self.str_field("created_at")
    }

    /// Speech-API key, once the account is verified.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.str_field("api_key")
    }

    /// Whether the e-mail address has been verified.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.fields
            .get("is_verified")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
