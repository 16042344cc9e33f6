//! Inbox endpoints under `/core/messages/`.

use crate::{
    api::{ApiClient, ApiError},
    services::types::{Message, MessagePage, UnreadCount},
};
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

/// Fetches one page of the inbox, optionally filtered on read state.
pub async fn list(
    client: &ApiClient,
    page: u32,
    read: Option<bool>,
) -> Result<MessagePage, ApiError> {
    client.get(&list_path(page, read)).await
}

pub async fn get(client: &ApiClient, id: u64) -> Result<Message, ApiError> {
    client.get(&format!("/core/messages/{id}/")).await
}

pub async fn delete(client: &ApiClient, id: u64) -> Result<Value, ApiError> {
    client.delete(&format!("/core/messages/{id}/delete/")).await
}

pub async fn mark_all_read(client: &ApiClient) -> Result<Value, ApiError> {
    client.post_empty("/core/messages/mark-all-read/").await
}

pub async fn unread_count(client: &ApiClient) -> Result<UnreadCount, ApiError> {
    client.get("/core/messages/unread-count/").await
}

/// Partially updates a message, typically `{"is_read": true}`.
pub async fn update<B: Serialize + ?Sized>(
    client: &ApiClient,
    id: u64,
    data: &B,
) -> Result<Message, ApiError> {
    client.patch(&format!("/core/messages/{id}/"), data).await
}

fn list_path(page: u32, read: Option<bool>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("page", &page.to_string());
    if let Some(read) = read {
        query.append_pair("read", if read { "true" } else { "false" });
    }
    format!("/core/messages/?{}", query.finish())
}
