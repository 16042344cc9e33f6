//! Per-resource façades over [`crate::api::ApiClient`]. Each function maps to
//! one remote operation with a fixed endpoint template. No retries beyond the
//! transport's, no caching, no validation: failures propagate verbatim.

pub mod auth;
pub mod messages;
pub mod public;
pub mod statistics;
pub mod types;

pub use types::{
    AuthResponse, ChangePasswordRequest, LinkActivation, LinkStatus, LoginCredentials, Message,
    MessagePage, PasswordResetConfirm, RegisterRequest, Statistics, UnreadCount, UserProfile,
};
