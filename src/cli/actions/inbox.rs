use super::{print_json, require_login};
use crate::{
    services::{messages, statistics},
    session::AuthSession,
};
use anyhow::Result;
use serde_json::json;

pub async fn list(session: &AuthSession, page: u32, read: Option<bool>) -> Result<()> {
    require_login(session)?;
    print_json(&messages::list(session.client(), page, read).await?)
}

pub async fn show(session: &AuthSession, id: u64) -> Result<()> {
    require_login(session)?;
    print_json(&messages::get(session.client(), id).await?)
}

pub async fn mark_read(session: &AuthSession, id: u64) -> Result<()> {
    require_login(session)?;
    let message = messages::update(session.client(), id, &json!({ "is_read": true })).await?;
    print_json(&message)
}

pub async fn delete(session: &AuthSession, id: u64) -> Result<()> {
    require_login(session)?;
    messages::delete(session.client(), id).await?;
    println!("Message {id} deleted");
    Ok(())
}

pub async fn mark_all_read(session: &AuthSession) -> Result<()> {
    require_login(session)?;
    messages::mark_all_read(session.client()).await?;
    println!("All messages marked as read");
    Ok(())
}

pub async fn unread_count(session: &AuthSession) -> Result<()> {
    require_login(session)?;
    let count = messages::unread_count(session.client()).await?;
    println!("{}", count.unread_count);
    Ok(())
}

pub async fn stats(session: &AuthSession) -> Result<()> {
    require_login(session)?;
    print_json(&statistics::get(session.client()).await?)
}
