//! Account endpoints under `/accounts/`. These helpers only forward arguments
//! and return the decoded payload; session bookkeeping lives in
//! [`crate::session::AuthSession`]. Never log request bodies here, most of them
//! carry credentials.

use crate::{
    api::{ApiClient, ApiError, RefreshResponse},
    services::types::{
        AuthResponse, ChangePasswordRequest, LinkActivation, LoginCredentials,
        PasswordResetConfirm, RegisterRequest, UserProfile,
    },
};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};

pub async fn register(client: &ApiClient, data: &RegisterRequest) -> Result<AuthResponse, ApiError> {
    client.post("/accounts/register/", data).await
}

pub async fn login(
    client: &ApiClient,
    credentials: &LoginCredentials,
) -> Result<AuthResponse, ApiError> {
    client.post("/accounts/login/", credentials).await
}

/// Invalidates every session of the current user on the server.
pub async fn logout_all(client: &ApiClient) -> Result<Value, ApiError> {
    client.post_empty("/accounts/logout-all/").await
}

pub async fn change_password(
    client: &ApiClient,
    data: &ChangePasswordRequest,
) -> Result<Value, ApiError> {
    client.post("/accounts/change-password/", data).await
}

pub async fn delete_account(client: &ApiClient, password: &SecretString) -> Result<Value, ApiError> {
    let body = json!({ "password": password.expose_secret() });
    client.post("/accounts/delete-account/", &body).await
}

/// Asks the server to email a reset link. The response does not reveal whether
/// the address exists.
pub async fn request_password_reset(client: &ApiClient, email: &str) -> Result<Value, ApiError> {
    client
        .post("/accounts/password-reset/", &json!({ "email": email }))
        .await
}

pub async fn confirm_password_reset(
    client: &ApiClient,
    data: &PasswordResetConfirm,
) -> Result<Value, ApiError> {
    client.post("/accounts/password-reset/confirm/", data).await
}

pub async fn get_profile(client: &ApiClient) -> Result<UserProfile, ApiError> {
    client.get("/accounts/profile/").await
}

pub async fn update_profile<B: Serialize + ?Sized>(
    client: &ApiClient,
    data: &B,
) -> Result<UserProfile, ApiError> {
    client.put("/accounts/profile/update/", data).await
}

/// Opens the shareable link for `duration_hours`.
pub async fn activate_link(
    client: &ApiClient,
    duration_hours: u32,
) -> Result<LinkActivation, ApiError> {
    client
        .post(
            "/accounts/link/activate/",
            &json!({ "duration_hours": duration_hours }),
        )
        .await
}

pub async fn deactivate_link(client: &ApiClient) -> Result<Value, ApiError> {
    client.post_empty("/accounts/link/deactivate/").await
}

pub async fn get_sessions(client: &ApiClient) -> Result<Value, ApiError> {
    client.get("/accounts/sessions/").await
}

pub async fn refresh_token(
    client: &ApiClient,
    refresh: &SecretString,
) -> Result<RefreshResponse, ApiError> {
    client.refresh_access_token(refresh).await
}
