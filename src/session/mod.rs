//! Auth session state machine, the single source of identity for the client.
//!
//! [`AuthSession`] owns the current [`SessionState`] and is the only writer of
//! it. Every transition that changes authentication status keeps the token store
//! in step: a completed transition never leaves tokens stored without an
//! authenticated session, nor an authenticated session without an access token.
//!
//! Flow Overview:
//! - `start` restores a persisted session by fetching the profile, clearing the
//!   tokens if that fails.
//! - `login` / `register` pass through `AuthInFlight`; only one may be
//!   outstanding at a time.
//! - `logout` is best-effort remotely and unconditional locally.
//!
//! Observers call [`AuthSession::subscribe`] to be woken on every transition.
//! When the transport abandons the session after a failed refresh, the session
//! drops to `Anonymous` with [`SESSION_EXPIRED`] before the login redirect runs.

mod state;

pub use state::{
    error_message, Session, SessionState, LOGIN_FAILED, REGISTRATION_FAILED, SESSION_EXPIRED,
};

use crate::{
    api::{ApiClient, ApiError},
    services::{
        auth,
        types::{AuthResponse, LoginCredentials, RegisterRequest, UserProfile},
    },
    storage::TokenKind,
};
use secrecy::SecretString;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("a login or registration is already in progress")]
    TransitionInFlight,
}

#[derive(Clone)]
pub struct AuthSession {
    client: ApiClient,
    state: Arc<watch::Sender<SessionState>>,
}

impl AuthSession {
    /// Creates a session in `AnonymousLoading`; call [`AuthSession::start`] to
    /// restore any persisted login.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        let (state, _) = watch::channel(SessionState::AnonymousLoading);
        let state = Arc::new(state);

        let watched = Arc::clone(&state);
        client.on_session_end(move || {
            if expire(&watched) {
                info!(to = "anonymous-error", "Session ended by transport");
            }
        });

        Self { client, state }
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().snapshot()
    }

    /// Receiver that observes every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Restores the persisted session, if any. A login or registration that
    /// is already in flight wins: `start` then leaves state and tokens alone.
    pub async fn start(&self) -> Session {
        let loading = self.state.send_if_modified(|state| {
            if matches!(state, SessionState::AuthInFlight) {
                false
            } else {
                *state = SessionState::AnonymousLoading;
                true
            }
        });
        if !loading {
            debug!("Authentication in flight, skipping session restore");
            return self.snapshot();
        }

        if !self.client.has_token(TokenKind::Access) {
            self.settle(SessionState::Anonymous { error: None });
            return self.snapshot();
        }

        match auth::get_profile(&self.client).await {
            Ok(user) => {
                self.settle(SessionState::Authenticated { user });
            }
            Err(err) => {
                warn!("Failed to restore session: {err}");
                let tokens = self.client.tokens();
                let settled = self.state.send_if_modified(|state| {
                    if matches!(state, SessionState::AnonymousLoading) {
                        tokens.clear();
                        *state = SessionState::Anonymous {
                            error: Some(SESSION_EXPIRED.to_string()),
                        };
                        true
                    } else {
                        false
                    }
                });
                if settled {
                    info!(
                        from = "anonymous-loading",
                        to = "anonymous-error",
                        "Session transition"
                    );
                }
            }
        }

        self.snapshot()
    }

    /// Logs in and stores the returned token pair.
    ///
    /// # Errors
    /// Returns the remote failure after recording its display message in the
    /// session, or `TransitionInFlight` if another login is outstanding.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse, SessionError> {
        self.begin_auth()?;
        let result = auth::login(&self.client, credentials).await;
        self.finish_auth(result, "non_field_errors", LOGIN_FAILED)
    }

    /// Creates an account and signs it in.
    ///
    /// # Errors
    /// Same contract as [`AuthSession::login`].
    pub async fn register(&self, data: &RegisterRequest) -> Result<AuthResponse, SessionError> {
        self.begin_auth()?;
        let result = auth::register(&self.client, data).await;
        self.finish_auth(result, "detail", REGISTRATION_FAILED)
    }

    /// Ends the session locally no matter what the server says.
    pub async fn logout(&self) {
        if self.client.has_token(TokenKind::Access) {
            if let Err(err) = auth::logout_all(&self.client).await {
                warn!("Remote logout failed: {err}");
            }
        } else {
            debug!("No access token stored, skipping remote logout");
        }

        self.end_locally();
    }

    /// Deletes the account, then ends the session locally without a remote
    /// logout.
    ///
    /// # Errors
    /// Returns the remote failure; the session is left unchanged in that case.
    pub async fn delete_account(&self, password: &SecretString) -> Result<(), SessionError> {
        auth::delete_account(&self.client, password).await?;
        self.end_locally();
        Ok(())
    }

    /// Shallow-merges `patch` into the current user. Returns `false` and does
    /// nothing when no user is signed in.
    pub fn update_user(&self, patch: Map<String, Value>) -> bool {
        self.state.send_if_modified(|state| match state {
            SessionState::Authenticated { user } => {
                user.merge(patch);
                true
            }
            _ => false,
        })
    }

    /// Re-fetches the profile of the signed-in user.
    ///
    /// # Errors
    /// Returns the remote failure. The session is left unchanged unless the
    /// transport gave up on it, in which case it drops to anonymous.
    pub async fn refresh_profile(&self) -> Result<UserProfile, SessionError> {
        match auth::get_profile(&self.client).await {
            Ok(user) => {
                self.state.send_if_modified(|state| match state {
                    SessionState::Authenticated { user: current } => {
                        *current = user.clone();
                        true
                    }
                    _ => false,
                });
                Ok(user)
            }
            Err(err) => {
                self.sync_with_store();
                Err(err.into())
            }
        }
    }

    /// Drops an authenticated session whose access token has disappeared from
    /// the store by other means than this client, such as another process
    /// sharing the token file. Returns `true` if the session was ended.
    pub fn sync_with_store(&self) -> bool {
        if self.client.has_token(TokenKind::Access) {
            return false;
        }

        let ended = expire(&self.state);
        if ended {
            info!(to = "anonymous-error", "Session ended by transport");
        }
        ended
    }

    fn end_locally(&self) {
        self.client.tokens().clear();
        self.transition(SessionState::Anonymous { error: None });
    }

    /// Leaves `AnonymousLoading` for `next` unless another transition got
    /// there first.
    fn settle(&self, next: SessionState) {
        let to = next.name();
        let settled = self.state.send_if_modified(|state| {
            if matches!(state, SessionState::AnonymousLoading) {
                *state = next;
                true
            } else {
                false
            }
        });
        if settled {
            info!(from = "anonymous-loading", to, "Session transition");
        }
    }
}

/// Moves an authenticated session to `Anonymous` with [`SESSION_EXPIRED`].
fn expire(state: &watch::Sender<SessionState>) -> bool {
    state.send_if_modified(|state| {
        if matches!(state, SessionState::Authenticated { .. }) {
            *state = SessionState::Anonymous {
                error: Some(SESSION_EXPIRED.to_string()),
            };
            true
        } else {
            false
        }
    })
}
