//! Client for an anonymous-messaging service.
//!
//! The crate is built around an authenticated HTTP transport that transparently
//! refreshes expired access tokens ([`api::ApiClient`]), a persisted token store
//! ([`storage`]), and the auth session state machine every protected operation
//! depends on ([`session::AuthSession`]). The [`services`] modules are thin
//! per-resource façades over the transport, and [`cli`] is the command-line
//! front end.

pub mod api;
pub mod cli;
pub mod services;
pub mod session;
pub mod storage;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
