use super::{print_json, require_login};
use crate::{
    services::{
        auth,
        types::{ChangePasswordRequest, LoginCredentials, PasswordResetConfirm, RegisterRequest},
    },
    session::{AuthSession, SessionError},
};
use anyhow::{anyhow, Result};
use secrecy::SecretString;
use serde_json::{Map, Value};
use tracing::info;

/// Turns a failed login/registration into the message the session recorded.
fn auth_failure(session: &AuthSession, err: SessionError) -> anyhow::Error {
    match err {
        SessionError::TransitionInFlight => anyhow!(err),
        SessionError::Api(_) => anyhow!(session
            .snapshot()
            .error
            .unwrap_or_else(|| err.to_string())),
    }
}

pub async fn login(session: &AuthSession, user: String, password: SecretString) -> Result<()> {
    let credentials = LoginCredentials {
        email_or_username: user,
        password,
    };

    let response = session
        .login(&credentials)
        .await
        .map_err(|err| auth_failure(session, err))?;

    info!("Logged in");
    println!(
        "Logged in as {}",
        response.user.username().unwrap_or("<unknown>")
    );
    Ok(())
}

pub async fn register(session: &AuthSession, data: &RegisterRequest) -> Result<()> {
    let response = session
        .register(data)
        .await
        .map_err(|err| auth_failure(session, err))?;

    println!(
        "Account created, logged in as {}",
        response.user.username().unwrap_or(&data.username)
    );
    Ok(())
}

pub async fn logout(session: &AuthSession) -> Result<()> {
    session.logout().await;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(session: &AuthSession) -> Result<()> {
    require_login(session)?;
    print_json(&session.refresh_profile().await?)
}

pub async fn update_profile(session: &AuthSession, fields: Map<String, Value>) -> Result<()> {
    require_login(session)?;
    let updated = auth::update_profile(session.client(), &fields).await?;
    session.update_user(updated.as_map().clone());
    print_json(&updated)
}

pub async fn change_password(session: &AuthSession, data: &ChangePasswordRequest) -> Result<()> {
    require_login(session)?;
    auth::change_password(session.client(), data).await?;
    println!("Password changed");
    Ok(())
}

pub async fn request_password_reset(session: &AuthSession, email: &str) -> Result<()> {
    auth::request_password_reset(session.client(), email).await?;
    println!("If an account exists for {email}, a reset link is on its way");
    Ok(())
}

pub async fn confirm_password_reset(
    session: &AuthSession,
    data: &PasswordResetConfirm,
) -> Result<()> {
    auth::confirm_password_reset(session.client(), data).await?;
    println!("Password reset, you can now log in");
    Ok(())
}

pub async fn delete_account(session: &AuthSession, password: &SecretString) -> Result<()> {
    require_login(session)?;
    session.delete_account(password).await?;
    println!("Account deleted");
    Ok(())
}

pub async fn sessions(session: &AuthSession) -> Result<()> {
    require_login(session)?;
    print_json(&auth::get_sessions(session.client()).await?)
}
