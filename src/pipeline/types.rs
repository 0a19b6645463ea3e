//! Shared types for the message processing pipeline.

use std::fmt;
use std::sync::Arc;

use crate::api::Responder;
use crate::pipeline::reply::ReplyTimings;

// ── Inbound message ─────────────────────────────────────────────────

/// Canonical inbound message.
///
/// The push listener reduces every qualifying event (direct message,
/// notify, pop-up notify) to this one shape before dispatch. Absent
/// fields hold their zero value. The message carries the capability to
/// answer its sender, so handlers need nothing else to reply.
#[derive(Clone)]
pub struct InboundMessage {
    /// Sender user id.
    pub from_id: i64,
    /// Message body.
    pub text: String,
    /// Recipient user id (the bot's account); 0 when unknown.
    pub to_user_id: i64,
    /// Inbox / message id; 0 when unknown.
    pub inbox_id: i64,
    /// Optional title, empty when the event had none.
    pub title: String,
    /// Raw `lastMessage` object from direct-message events.
    pub last_message: Option<serde_json::Value>,
    pub(crate) timings: ReplyTimings,
    pub(crate) responder: Arc<dyn Responder>,
}

impl InboundMessage {
    pub fn new(responder: Arc<dyn Responder>, from_id: i64, text: impl Into<String>) -> Self {
        Self {
            from_id,
            text: text.into(),
            to_user_id: 0,
            inbox_id: 0,
            title: String::new(),
            last_message: None,
            timings: ReplyTimings::default(),
            responder,
        }
    }

    pub fn with_recipient(mut self, to_user_id: i64, inbox_id: i64) -> Self {
        self.to_user_id = to_user_id;
        self.inbox_id = inbox_id;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_last_message(mut self, last_message: Option<serde_json::Value>) -> Self {
        self.last_message = last_message;
        self
    }

    pub fn with_timings(mut self, timings: ReplyTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn timings(&self) -> ReplyTimings {
        self.timings
    }
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("from_id", &self.from_id)
            .field("text", &self.text)
            .field("to_user_id", &self.to_user_id)
            .field("inbox_id", &self.inbox_id)
            .field("title", &self.title)
            .field("last_message", &self.last_message)
            .finish_non_exhaustive()
    }
}
