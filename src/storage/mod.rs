//! Token persistence for the access/refresh pair issued by the messaging API.
//!
//! The transport and the auth session are the only writers. Absence of either
//! token is a valid state and means "anonymous"; storage failures are logged and
//! never surface to callers. Token material must never be logged.

mod file;
mod memory;

pub use file::{default_token_path, FileTokenStore};
pub use memory::MemoryTokenStore;

use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;

/// Which of the two bearer credentials a store slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// Stable storage key for the token kind.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Access => "access_token",
            Self::Refresh => "refresh_token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Access and refresh token issued together on login or registration.
#[derive(Clone, Debug, Deserialize)]
#[serde(from = "RawTokenPair")]
pub struct TokenPair {
    pub access: SecretString,
    pub refresh: SecretString,
}

#[derive(Deserialize)]
struct RawTokenPair {
    access: String,
    refresh: String,
}

impl From<RawTokenPair> for TokenPair {
    fn from(raw: RawTokenPair) -> Self {
        Self {
            access: SecretString::from(raw.access),
            refresh: SecretString::from(raw.refresh),
        }
    }
}

/// Key/value holder for the two bearer tokens, shared across the process.
pub trait TokenStore: Send + Sync {
    fn get(&self, kind: TokenKind) -> Option<SecretString>;

    fn set(&self, kind: TokenKind, token: SecretString);

    /// Removes both tokens.
    fn clear(&self);

    fn set_pair(&self, pair: &TokenPair) {
        self.set(TokenKind::Access, pair.access.clone());
        self.set(TokenKind::Refresh, pair.refresh.clone());
    }

    fn has(&self, kind: TokenKind) -> bool {
        self.get(kind).is_some()
    }
}
