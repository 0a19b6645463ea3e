//! In-memory Kwork API used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{Dialog, InboxMessage, KworkApi, Responder};
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ChannelToken,
    ListDialogs,
    FetchThread(String),
    SendText(i64, String),
    SetTyping(i64),
}

#[derive(Default)]
pub struct FakeApi {
    dialogs: Vec<Dialog>,
    threads: HashMap<String, Vec<InboxMessage>>,
    fail_lookups: bool,
    fail_typing: bool,
    fail_send: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub fn with_dialog(mut self, user_id: i64, username: &str, last_message: &str) -> Self {
        self.dialogs.push(Dialog {
            user_id,
            username: username.to_string(),
            last_message_text: last_message.to_string(),
            ..Default::default()
        });
        self
    }

    /// Thread with `username`, newest message first.
    pub fn with_thread(mut self, username: &str, messages: Vec<InboxMessage>) -> Self {
        self.threads.insert(username.to_string(), messages);
        self
    }

    pub fn failing_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    pub fn failing_typing(mut self) -> Self {
        self.fail_typing = true;
        self
    }

    pub fn failing_send(mut self) -> Self {
        self.fail_send = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn inbox(message_id: i64, from_id: i64, to_id: i64, text: &str) -> InboxMessage {
    InboxMessage {
        message_id,
        from_id,
        to_id,
        message: text.to_string(),
        ..Default::default()
    }
}

#[async_trait]
impl Responder for FakeApi {
    async fn send_text(&self, user_id: i64, text: &str) -> Result<(), ApiError> {
        self.record(Call::SendText(user_id, text.to_string()));
        if self.fail_send {
            return Err(ApiError::Rejected("send disabled".into()));
        }
        Ok(())
    }

    async fn set_typing(&self, user_id: i64) -> Result<(), ApiError> {
        self.record(Call::SetTyping(user_id));
        if self.fail_typing {
            return Err(ApiError::Rejected("typing disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KworkApi for FakeApi {
    async fn fetch_channel_token(&self) -> Result<String, ApiError> {
        self.record(Call::ChannelToken);
        Ok("test-channel".to_string())
    }

    async fn list_dialogs(&self) -> Result<Vec<Dialog>, ApiError> {
        self.record(Call::ListDialogs);
        if self.fail_lookups {
            return Err(ApiError::Rejected("dialogs unavailable".into()));
        }
        Ok(self.dialogs.clone())
    }

    async fn fetch_thread(&self, username: &str) -> Result<Vec<InboxMessage>, ApiError> {
        self.record(Call::FetchThread(username.to_string()));
        if self.fail_lookups {
            return Err(ApiError::Rejected("inboxes unavailable".into()));
        }
        Ok(self.threads.get(username).cloned().unwrap_or_default())
    }
}
