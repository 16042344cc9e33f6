//! Request and response shapes for the messaging API. Server records are kept
//! close to the wire format; unknown fields are preserved where the client only
//! passes data through.

use crate::storage::TokenPair;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Server-defined user record. The core only merges and reads it; the helpers
/// cover the fields the client displays.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(Map<String, Value>);

impl UserProfile {
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Shallow merge: every top-level key of `patch` replaces the current value.
    pub fn merge(&mut self, patch: Map<String, Value>) {
        self.0.extend(patch);
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.get_str("username")
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.get_str("email")
    }

    /// Identifier of the user's shareable link.
    #[must_use]
    pub fn unique_link(&self) -> Option<&str> {
        self.get_str("unique_link")
    }

    #[must_use]
    pub fn link_is_active(&self) -> bool {
        self.get("link_is_active")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn link_activated_at(&self) -> Option<&str> {
        self.get_str("link_activated_at")
    }

    #[must_use]
    pub fn link_duration_hours(&self) -> Option<u64> {
        self.get("link_duration_hours").and_then(Value::as_u64)
    }

    fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for UserProfile {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct LoginCredentials {
    pub email_or_username: String,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
    #[serde(serialize_with = "expose")]
    pub password_confirm: SecretString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

/// Successful login or registration: the user record and a fresh token pair.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChangePasswordRequest {
    #[serde(serialize_with = "expose")]
    pub old_password: SecretString,
    #[serde(serialize_with = "expose")]
    pub new_password: SecretString,
    #[serde(serialize_with = "expose")]
    pub new_password_confirm: SecretString,
}

/// Completes a password reset with the `uid`/`token` pair from the reset email.
#[derive(Clone, Debug, Serialize)]
pub struct PasswordResetConfirm {
    pub uid: String,
    #[serde(serialize_with = "expose")]
    pub token: SecretString,
    #[serde(serialize_with = "expose")]
    pub new_password: SecretString,
    #[serde(serialize_with = "expose")]
    pub new_password_confirm: SecretString,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkActivation {
    pub link_activated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Public view of a shareable link.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkStatus {
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub link_expires_at: Option<String>,
    #[serde(default)]
    pub messages_count: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub content: String,
    pub created_at: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub auto_response: Option<String>,
}

/// One page of the inbox, in the server's paginated envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessagePage {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<Message>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread_count: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    pub total_messages: u64,
    pub read_messages: u64,
    pub auto_responses: u64,
    pub link_activation_count: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile(value: Value) -> UserProfile {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn merge_is_shallow() {
        let mut user = profile(json!({
            "username": "alice",
            "link_is_active": false,
            "settings": {"theme": "dark", "lang": "fr"}
        }));

        let patch = json!({"link_is_active": true, "settings": {"theme": "light"}});
        user.merge(patch.as_object().cloned().unwrap());

        assert_eq!(user.username(), Some("alice"));
        assert!(user.link_is_active());
        assert_eq!(user.get("settings"), Some(&json!({"theme": "light"})));
    }

    #[test]
    fn profile_helpers_read_known_fields() {
        let user = profile(json!({
            "username": "bob",
            "email": "bob@example.com",
            "unique_link": "x7Yq",
            "link_is_active": true,
            "link_activated_at": "2026-10-19T10:00:00Z",
            "link_duration_hours": 24
        }));

        assert_eq!(user.email(), Some("bob@example.com"));
        assert_eq!(user.unique_link(), Some("x7Yq"));
        assert_eq!(user.link_activated_at(), Some("2026-10-19T10:00:00Z"));
        assert_eq!(user.link_duration_hours(), Some(24));
    }

    #[test]
    fn credentials_serialize_password_but_do_not_debug_it() {
        let credentials = LoginCredentials {
            email_or_username: "alice".to_string(),
            password: SecretString::from("hunter2".to_string()),
        };

        assert_eq!(
            serde_json::to_value(&credentials).unwrap(),
            json!({"email_or_username": "alice", "password": "hunter2"})
        );
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }

    #[test]
    fn register_request_omits_empty_optionals() {
        let request = RegisterRequest {
            username: "carol".to_string(),
            email: "carol@example.com".to_string(),
            password: SecretString::from("pw".to_string()),
            password_confirm: SecretString::from("pw".to_string()),
            gender: Some("F".to_string()),
            ..RegisterRequest::default()
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["gender"], "F");
        assert!(value.get("first_name").is_none());
        assert!(value.get("birth_date").is_none());
    }

    #[test]
    fn auth_response_decodes_token_pair() {
        let response: AuthResponse = serde_json::from_value(json!({
            "user": {"username": "dave"},
            "tokens": {"access": "a", "refresh": "r"}
        }))
        .unwrap();

        assert_eq!(response.user.username(), Some("dave"));
        assert_eq!(response.tokens.access.expose_secret(), "a");
        assert_eq!(response.tokens.refresh.expose_secret(), "r");
    }

    #[test]
    fn statistics_default_missing_counters() {
        let stats: Statistics = serde_json::from_value(json!({"total_messages": 4})).unwrap();
        assert_eq!(stats.total_messages, 4);
        assert_eq!(stats.auto_responses, 0);
    }
}
