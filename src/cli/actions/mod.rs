pub mod account;
pub mod inbox;
pub mod link;

use crate::{
    api::{ApiClient, LoginRedirect},
    cli::globals::GlobalArgs,
    services::types::{ChangePasswordRequest, PasswordResetConfirm, RegisterRequest},
    session::AuthSession,
    storage::{FileTokenStore, TokenStore},
};
use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug)]
pub enum Action {
    Login {
        user: String,
        password: SecretString,
    },
    Register(Box<RegisterRequest>),
    Logout,
    Whoami,
    UpdateProfile {
        fields: Map<String, Value>,
    },
    ChangePassword(ChangePasswordRequest),
    RequestPasswordReset {
        email: String,
    },
    ConfirmPasswordReset(PasswordResetConfirm),
    DeleteAccount {
        password: SecretString,
    },
    Sessions,
    ActivateLink {
        hours: u32,
    },
    DeactivateLink,
    LinkStatus {
        link: String,
    },
    SendMessage {
        link: String,
        content: String,
    },
    ListMessages {
        page: u32,
        read: Option<bool>,
    },
    ShowMessage {
        id: u64,
    },
    MarkRead {
        id: u64,
    },
    DeleteMessage {
        id: u64,
    },
    MarkAllRead,
    UnreadCount,
    Stats,
}

/// Tells the user to sign in again once the stored session is unusable.
pub struct PromptLogin;

impl LoginRedirect for PromptLogin {
    fn redirect_to_login(&self) {
        eprintln!("Your session has expired. Run `murmur login` to sign in again.");
    }
}

/// Handle an action against the configured API
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    let token_file = globals.token_file.as_deref().context(
        "Could not determine a config directory, pass --token-file or set MURMUR_TOKEN_FILE",
    )?;
    let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::open(token_file));
    let client = ApiClient::new(&globals.api_url, tokens, Arc::new(PromptLogin))?;
    let session = AuthSession::new(client);
    session.start().await;

    run(action, &session).await
}

async fn run(action: Action, session: &AuthSession) -> Result<()> {
    match action {
        Action::Login { user, password } => account::login(session, user, password).await,
        Action::Register(data) => account::register(session, &data).await,
        Action::Logout => account::logout(session).await,
        Action::Whoami => account::whoami(session).await,
        Action::UpdateProfile { fields } => account::update_profile(session, fields).await,
        Action::ChangePassword(data) => account::change_password(session, &data).await,
        Action::RequestPasswordReset { email } => {
            account::request_password_reset(session, &email).await
        }
        Action::ConfirmPasswordReset(data) => {
            account::confirm_password_reset(session, &data).await
        }
        Action::DeleteAccount { password } => account::delete_account(session, &password).await,
        Action::Sessions => account::sessions(session).await,
        Action::ActivateLink { hours } => link::activate(session, hours).await,
        Action::DeactivateLink => link::deactivate(session).await,
        Action::LinkStatus { link } => link::status(session, &link).await,
        Action::SendMessage { link, content } => link::send(session, &link, &content).await,
        Action::ListMessages { page, read } => inbox::list(session, page, read).await,
        Action::ShowMessage { id } => inbox::show(session, id).await,
        Action::MarkRead { id } => inbox::mark_read(session, id).await,
        Action::DeleteMessage { id } => inbox::delete(session, id).await,
        Action::MarkAllRead => inbox::mark_all_read(session).await,
        Action::UnreadCount => inbox::unread_count(session).await,
        Action::Stats => inbox::stats(session).await,
    }
}

/// Fails early for commands that need a signed-in user.
fn require_login(session: &AuthSession) -> Result<()> {
    if session.snapshot().is_authenticated {
        Ok(())
    } else {
        bail!("Not logged in. Run `murmur login` first.")
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
