//! Unauthenticated endpoints under `/public/`, used by senders who only know a
//! recipient's shareable link.

use crate::{
    api::{encode_segment, ApiClient, ApiError},
    services::types::LinkStatus,
};
use serde_json::{json, Value};

/// Sends an anonymous message to the owner of `unique_link`.
pub async fn send_message(
    client: &ApiClient,
    unique_link: &str,
    content: &str,
) -> Result<Value, ApiError> {
    let body = json!({
        "content": content,
        "recipient_link": unique_link,
    });
    client.post("/public/send-message/", &body).await
}

/// Reports whether a link currently accepts messages and when it expires.
pub async fn check_link(client: &ApiClient, unique_link: &str) -> Result<LinkStatus, ApiError> {
    client
        .get(&format!("/public/check-link/{}/", encode_segment(unique_link)))
        .await
}

pub async fn user_info(client: &ApiClient, unique_link: &str) -> Result<Value, ApiError> {
    client
        .get(&format!("/public/user/{}/", encode_segment(unique_link)))
        .await
}

/// Display name of the link's owner.
pub async fn user_name(client: &ApiClient, unique_link: &str) -> Result<Value, ApiError> {
    client
        .get(&format!("/public/user-name/{}/", encode_segment(unique_link)))
        .await
}
