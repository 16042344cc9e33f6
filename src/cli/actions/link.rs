use super::{print_json, require_login};
use crate::{
    services::{auth, public},
    session::AuthSession,
};
use anyhow::Result;
use serde_json::{json, Map, Value};
use tracing::debug;

pub async fn activate(session: &AuthSession, hours: u32) -> Result<()> {
    require_login(session)?;
    let activation = auth::activate_link(session.client(), hours).await?;

    let mut patch = Map::new();
    patch.insert("link_is_active".to_string(), Value::Bool(true));
    patch.insert("link_duration_hours".to_string(), json!(hours));
    if let Some(at) = &activation.link_activated_at {
        patch.insert("link_activated_at".to_string(), json!(at));
    }
    session.update_user(patch);

    let link = session
        .snapshot()
        .user
        .and_then(|user| user.unique_link().map(str::to_string));
    match link {
        Some(link) => println!("Link {link} is open for {hours}h"),
        None => println!("Link is open for {hours}h"),
    }
    Ok(())
}

pub async fn deactivate(session: &AuthSession) -> Result<()> {
    require_login(session)?;
    auth::deactivate_link(session.client()).await?;

    let mut patch = Map::new();
    patch.insert("link_is_active".to_string(), Value::Bool(false));
    session.update_user(patch);

    println!("Link closed");
    Ok(())
}

pub async fn status(session: &AuthSession, link: &str) -> Result<()> {
    let status = public::check_link(session.client(), link).await?;
    debug!(is_active = status.is_active, "Checked link");
    print_json(&status)
}

pub async fn send(session: &AuthSession, link: &str, content: &str) -> Result<()> {
    let response = public::send_message(session.client(), link, content).await?;
    if response.is_null() {
        println!("Message sent");
        Ok(())
    } else {
        print_json(&response)
    }
}
