use crate::{api::ApiError, services::UserProfile};
use serde::Serialize;
use serde_json::Value;

/// Shown when a persisted session could not be restored.
pub const SESSION_EXPIRED: &str = "Session expired";
pub const LOGIN_FAILED: &str = "Login failed";
pub const REGISTRATION_FAILED: &str = "Registration failed";

/// Named states of the auth session.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    /// Initial state until the persisted session has been checked.
    AnonymousLoading,
    /// Idle without a user. `error` holds the last display message, if any.
    Anonymous { error: Option<String> },
    /// A login or registration call is outstanding.
    AuthInFlight,
    Authenticated { user: UserProfile },
}

impl SessionState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AnonymousLoading => "anonymous-loading",
            Self::Anonymous { error: None } => "anonymous",
            Self::Anonymous { error: Some(_) } => "anonymous-error",
            Self::AuthInFlight => "auth-in-flight",
            Self::Authenticated { .. } => "authenticated",
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        match self {
            Self::AnonymousLoading | Self::AuthInFlight => Session {
                user: None,
                is_authenticated: false,
                is_loading: true,
                error: None,
            },
            Self::Anonymous { error } => Session {
                user: None,
                is_authenticated: false,
                is_loading: false,
                error: error.clone(),
            },
            Self::Authenticated { user } => Session {
                user: Some(user.clone()),
                is_authenticated: true,
                is_loading: false,
                error: None,
            },
        }
    }
}

/// Read-only view of the session handed to the rest of the application.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Session {
    pub user: Option<UserProfile>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Pulls a display message out of a failed auth call.
///
/// Looks at `primary` first, then `detail` and `non_field_errors`, then the
/// first field error; falls back to `default` when the failure carries no
/// usable payload.
#[must_use]
pub fn error_message(err: &ApiError, primary: &str, default: &str) -> String {
    let Some(payload) = err.payload() else {
        return default.to_string();
    };

    [primary, "detail", "non_field_errors"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(first_text))
        .or_else(|| {
            payload.as_object()?.iter().find_map(|(field, value)| {
                first_text(value).map(|text| format!("{field}: {text}"))
            })
        })
        .unwrap_or_else(|| default.to_string())
}

/// A string, or the first string of an array of strings.
fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Array(items) => items.first().and_then(first_text),
        _ => None,
    }
}
