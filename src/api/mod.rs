//! Kwork request/response API.
//!
//! The push listener and the dispatcher only see the two traits below;
//! [`KworkClient`] is the HTTP implementation used by the binary.

pub mod client;
pub mod types;

pub use client::KworkClient;
pub use types::{Dialog, DialogLastMessage, InboxMessage};

use async_trait::async_trait;

use crate::error::ApiError;

/// Outbound capability bound into every inbound message.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Send a text message to a user.
    async fn send_text(&self, user_id: i64, text: &str) -> Result<(), ApiError>;

    /// Show the "typing" indicator to a user.
    async fn set_typing(&self, user_id: i64) -> Result<(), ApiError>;
}

/// Lookups consumed by the push listener and the dispatcher.
#[async_trait]
pub trait KworkApi: Responder {
    /// Fetch a fresh push channel token. Called before every (re)connect.
    async fn fetch_channel_token(&self) -> Result<String, ApiError>;

    /// All dialogs, most recently active first.
    async fn list_dialogs(&self) -> Result<Vec<Dialog>, ApiError>;

    /// Message history with one counterpart, addressed by login.
    async fn fetch_thread(&self, username: &str) -> Result<Vec<InboxMessage>, ApiError>;
}
