//! Push channel event decoding.
//!
//! Frames arrive as `{"text": "<json>"}` where the inner JSON is
//! `{"event": <tag>, "data": {...}}`. The same "new message" occurrence
//! shows up in three shapes:
//! - `new_inbox` carries the message itself;
//! - `notify` only references it, optionally with `dialog_data`;
//! - `pop_up_notify` references it by the sender's username.
//!
//! The decoder turns all three into one [`InboundMessage`], fetching the
//! missing content from the API when the frame is only a reference. Any
//! parse or lookup failure yields no message and is only logged.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{InboxMessage, KworkApi, Responder};
use crate::pipeline::reply::ReplyTimings;
use crate::pipeline::types::InboundMessage;

/// Event tags seen on the push channel.
pub mod tags {
    pub const IS_TYPING: &str = "is_typing";
    pub const NEW_INBOX: &str = "new_inbox";
    pub const NOTIFY: &str = "notify";
    pub const POP_UP_NOTIFY: &str = "pop_up_notify";
    pub const INBOX_MESSAGE_DELETE: &str = "inbox_message_delete";
    pub const REMOVE_POP_UP_NOTIFY: &str = "remove_pop_up_notify";
    pub const DIALOG_UPDATED: &str = "dialog_updated";
}

/// Key inside `notify` data signalling a new message.
const NOTIFY_NEW_MESSAGE: &str = "new_message";

#[derive(Debug, Deserialize)]
struct Envelope {
    text: String,
}

/// Inner event of a push frame. `data` is never validated as a whole.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Parse both JSON layers of a frame.
pub fn parse_frame(raw: &str) -> Result<RawEvent, serde_json::Error> {
    let envelope: Envelope = serde_json::from_str(raw).inspect_err(|e| {
        warn!(error = %e, "Failed to unmarshal outer event");
    })?;
    serde_json::from_str(&envelope.text).inspect_err(|e| {
        warn!(error = %e, "Failed to unmarshal event");
    })
}

/// Turns push frames into canonical messages.
#[derive(Clone)]
pub struct EventDecoder {
    api: Arc<dyn KworkApi>,
    timings: ReplyTimings,
}

impl EventDecoder {
    pub fn new(api: Arc<dyn KworkApi>, timings: ReplyTimings) -> Self {
        Self { api, timings }
    }

    /// Decode one raw frame into at most one message.
    pub async fn decode(&self, raw: &str) -> Option<InboundMessage> {
        debug!(frame = %raw, "Received push frame");
        let event = parse_frame(raw).ok()?;
        self.normalize(&event).await
    }

    /// Route an already parsed event by tag.
    pub async fn normalize(&self, event: &RawEvent) -> Option<InboundMessage> {
        match event.event.as_str() {
            tags::IS_TYPING => None,
            tags::NEW_INBOX => Some(self.from_new_inbox(&event.data)),
            tags::NOTIFY => self.from_notify(&event.data).await,
            tags::POP_UP_NOTIFY => self.from_pop_up_notify(&event.data).await,
            other => {
                debug!(event = other, "Ignoring push event");
                None
            }
        }
    }

    fn message(&self, from_id: i64, text: impl Into<String>) -> InboundMessage {
        let responder: Arc<dyn Responder> = self.api.clone();
        InboundMessage::new(responder, from_id, text).with_timings(self.timings)
    }

    /// `new_inbox`: everything is in the payload.
    fn from_new_inbox(&self, data: &Value) -> InboundMessage {
        let last_message = data.get("lastMessage").filter(|v| v.is_object()).cloned();

        self.message(int_field(data, "from"), str_field(data, "inboxMessage"))
            .with_recipient(int_field(data, "to_user_id"), int_field(data, "inbox_id"))
            .with_title(str_field(data, "title"))
            .with_last_message(last_message)
    }

    /// `notify`: only a pointer to a new message.
    async fn from_notify(&self, data: &Value) -> Option<InboundMessage> {
        if data.get(NOTIFY_NEW_MESSAGE).is_none_or(Value::is_null) {
            return None;
        }

        match data.get("dialog_data") {
            None | Some(Value::Null) => self.from_latest_dialog().await,
            Some(dialog_data) => {
                let login = dialog_data
                    .as_array()?
                    .first()?
                    .as_object()?
                    .get("login")?
                    .as_str()
                    .filter(|login| !login.is_empty())?;
                self.from_thread(login).await
            }
        }
    }

    /// `pop_up_notify`: sender username under `pop_up_notify.data.username`.
    async fn from_pop_up_notify(&self, data: &Value) -> Option<InboundMessage> {
        let username = data
            .get("pop_up_notify")?
            .as_object()?
            .get("data")?
            .as_object()?
            .get("username")?
            .as_str()
            .filter(|name| !name.is_empty())?;
        self.from_thread(username).await
    }

    /// Summary of the most recently active dialog. Recipient and inbox ids stay unset.
    async fn from_latest_dialog(&self) -> Option<InboundMessage> {
        let dialogs = match self.api.list_dialogs().await {
            Ok(dialogs) => dialogs,
            Err(e) => {
                warn!(error = %e, "Failed to get dialogs");
                return None;
            }
        };
        let Some(latest) = dialogs.first() else {
            warn!("Failed to get dialogs: dialog list is empty");
            return None;
        };
        Some(self.message(latest.user_id, latest.last_message_text.clone()))
    }

    /// Newest message of the thread with `username`.
    ///
    /// Threads are returned newest first, so element 0 is the message that
    /// triggered the notification.
    async fn from_thread(&self, username: &str) -> Option<InboundMessage> {
        let thread = match self.api.fetch_thread(username).await {
            Ok(thread) => thread,
            Err(e) => {
                warn!(username, error = %e, "Failed to get messages");
                return None;
            }
        };
        let Some(newest) = thread.first() else {
            warn!(username, "Failed to get messages: thread is empty");
            return None;
        };
        Some(self.from_inbox_message(newest))
    }

    fn from_inbox_message(&self, msg: &InboxMessage) -> InboundMessage {
        self.message(msg.from_id, msg.message.clone())
            .with_recipient(msg.to_id, msg.message_id)
    }
}

/// Integer field; JSON numbers may be floats and are truncated. Anything else is 0.
fn int_field(data: &Value, key: &str) -> i64 {
    data.get(key)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

/// String field; anything but a JSON string is "".
fn str_field(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{Call, FakeApi, inbox};

    fn decoder(api: &Arc<FakeApi>) -> EventDecoder {
        EventDecoder::new(api.clone(), ReplyTimings::IMMEDIATE)
    }

    /// Wrap an inner event the way the server does.
    fn frame(event: &str, data: Value) -> String {
        let inner = json!({"event": event, "data": data}).to_string();
        json!({ "text": inner }).to_string()
    }

    // ── Envelope parsing ────────────────────────────────────────────

    #[test]
    fn parse_frame_reads_both_layers() {
        let event = parse_frame(&frame("notify", json!({"a": 1}))).unwrap();
        assert_eq!(event.event, "notify");
        assert_eq!(event.data["a"], 1);
    }

    #[test]
    fn parse_frame_without_data_defaults_to_null() {
        let raw = json!({"text": "{\"event\":\"is_typing\"}"}).to_string();
        let event = parse_frame(&raw).unwrap();
        assert!(event.data.is_null());
    }

    #[tokio::test]
    async fn malformed_outer_frame_yields_nothing() {
        let api = Arc::new(FakeApi::default());
        let d = decoder(&api);

        assert!(d.decode("not json").await.is_none());
        assert!(d.decode("{\"txt\": \"x\"}").await.is_none());
        assert!(d.decode("{\"text\": 5}").await.is_none());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_inner_frame_yields_nothing() {
        let api = Arc::new(FakeApi::default());
        let d = decoder(&api);

        let raw = json!({"text": "{broken"}).to_string();
        assert!(d.decode(&raw).await.is_none());
        let raw = json!({"text": "{\"data\": {}}"}).to_string();
        assert!(d.decode(&raw).await.is_none());
    }

    // ── Tag routing ─────────────────────────────────────────────────

    #[tokio::test]
    async fn typing_indicator_yields_nothing() {
        let api = Arc::new(FakeApi::default().with_dialog(1, "a", "x"));
        let d = decoder(&api);

        for data in [json!({}), json!({"from": 5, "inboxMessage": "hi"}), Value::Null] {
            assert!(d.decode(&frame(tags::IS_TYPING, data)).await.is_none());
        }
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn other_tags_yield_nothing() {
        let api = Arc::new(FakeApi::default());
        let d = decoder(&api);

        for tag in [
            tags::DIALOG_UPDATED,
            tags::INBOX_MESSAGE_DELETE,
            tags::REMOVE_POP_UP_NOTIFY,
            "something_new",
        ] {
            assert!(d.decode(&frame(tag, json!({"new_message": 1}))).await.is_none());
        }
    }

    // ── new_inbox ───────────────────────────────────────────────────

    #[tokio::test]
    async fn new_inbox_extracts_all_fields() {
        let api = Arc::new(FakeApi::default());
        let d = decoder(&api);

        let msg = d
            .decode(&frame(
                tags::NEW_INBOX,
                json!({
                    "from": 123.0,
                    "inboxMessage": "привет",
                    "to_user_id": 456,
                    "inbox_id": 789,
                    "title": "Заказ",
                    "lastMessage": {"message": "привет", "time": 1},
                }),
            ))
            .await
            .unwrap();

        assert_eq!(msg.from_id, 123);
        assert_eq!(msg.text, "привет");
        assert_eq!(msg.to_user_id, 456);
        assert_eq!(msg.inbox_id, 789);
        assert_eq!(msg.title, "Заказ");
        assert_eq!(msg.last_message.unwrap()["time"], 1);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn new_inbox_defaults_missing_and_mistyped_fields() {
        let api = Arc::new(FakeApi::default());
        let d = decoder(&api);

        let msg = d
            .decode(&frame(
                tags::NEW_INBOX,
                json!({"from": "123", "inboxMessage": 5, "lastMessage": "nope"}),
            ))
            .await
            .unwrap();

        assert_eq!(msg.from_id, 0);
        assert_eq!(msg.text, "");
        assert_eq!(msg.to_user_id, 0);
        assert_eq!(msg.inbox_id, 0);
        assert_eq!(msg.title, "");
        assert!(msg.last_message.is_none());
    }

    #[tokio::test]
    async fn new_inbox_carries_decoder_timings() {
        let api = Arc::new(FakeApi::default());
        let msg = decoder(&api)
            .decode(&frame(tags::NEW_INBOX, json!({"from": 1})))
            .await
            .unwrap();
        assert_eq!(msg.timings(), ReplyTimings::IMMEDIATE);
    }

    #[tokio::test]
    async fn decoded_message_replies_through_decoder_api() {
        let api = Arc::new(FakeApi::default());
        let msg = decoder(&api)
            .decode(&frame(tags::NEW_INBOX, json!({"from": 9, "inboxMessage": "hi"})))
            .await
            .unwrap();

        msg.answer_simulation("hello").await.unwrap();
        assert_eq!(
            api.calls(),
            vec![Call::SetTyping(9), Call::SendText(9, "hello".into())]
        );
    }

    // ── notify ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn notify_without_dialog_data_uses_latest_dialog() {
        let api = Arc::new(
            FakeApi::default()
                .with_dialog(42, "alice", "нужен бот")
                .with_dialog(43, "bob", "older"),
        );
        let d = decoder(&api);

        let msg = d
            .decode(&frame(tags::NOTIFY, json!({"new_message": 1})))
            .await
            .unwrap();

        assert_eq!(msg.from_id, 42);
        assert_eq!(msg.text, "нужен бот");
        assert_eq!(msg.to_user_id, 0);
        assert_eq!(msg.inbox_id, 0);
        assert_eq!(api.calls(), vec![Call::ListDialogs]);
    }

    #[tokio::test]
    async fn notify_with_null_dialog_data_uses_latest_dialog() {
        let api = Arc::new(FakeApi::default().with_dialog(42, "alice", "hi"));
        let msg = decoder(&api)
            .decode(&frame(tags::NOTIFY, json!({"new_message": 1, "dialog_data": null})))
            .await
            .unwrap();
        assert_eq!(msg.from_id, 42);
    }

    #[tokio::test]
    async fn notify_fallback_with_no_dialogs_yields_nothing() {
        let api = Arc::new(FakeApi::default());
        assert!(decoder(&api)
            .decode(&frame(tags::NOTIFY, json!({"new_message": 1})))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn notify_with_dialog_data_takes_newest_thread_message() {
        let api = Arc::new(FakeApi::default().with_thread(
            "carol",
            vec![inbox(902, 7, 1, "newest"), inbox(901, 7, 1, "older")],
        ));
        let d = decoder(&api);

        let msg = d
            .decode(&frame(
                tags::NOTIFY,
                json!({"new_message": 1, "dialog_data": [{"login": "carol"}, {"login": "dave"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(msg.from_id, 7);
        assert_eq!(msg.text, "newest");
        assert_eq!(msg.to_user_id, 1);
        assert_eq!(msg.inbox_id, 902);
        assert_eq!(api.calls(), vec![Call::FetchThread("carol".into())]);
    }

    #[tokio::test]
    async fn notify_without_new_message_yields_nothing() {
        let api = Arc::new(FakeApi::default().with_dialog(42, "alice", "hi"));
        let d = decoder(&api);

        assert!(d.decode(&frame(tags::NOTIFY, json!({}))).await.is_none());
        assert!(d
            .decode(&frame(tags::NOTIFY, json!({"new_message": null})))
            .await
            .is_none());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn notify_with_unusable_dialog_data_yields_nothing() {
        let api = Arc::new(FakeApi::default().with_thread("carol", vec![inbox(1, 7, 1, "x")]));
        let d = decoder(&api);

        for dialog_data in [
            json!([]),
            json!("carol"),
            json!([5]),
            json!([{"login": ""}]),
            json!([{"name": "carol"}]),
        ] {
            let data = json!({"new_message": 1, "dialog_data": dialog_data});
            assert!(d.decode(&frame(tags::NOTIFY, data)).await.is_none());
        }
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn notify_lookup_failure_yields_nothing() {
        let api = Arc::new(
            FakeApi::default()
                .with_dialog(42, "alice", "hi")
                .with_thread("carol", vec![inbox(1, 7, 1, "x")])
                .failing_lookups(),
        );
        let d = decoder(&api);

        assert!(d
            .decode(&frame(tags::NOTIFY, json!({"new_message": 1})))
            .await
            .is_none());
        assert!(d
            .decode(&frame(
                tags::NOTIFY,
                json!({"new_message": 1, "dialog_data": [{"login": "carol"}]}),
            ))
            .await
            .is_none());
    }

    // ── pop_up_notify ───────────────────────────────────────────────

    #[tokio::test]
    async fn pop_up_notify_fetches_thread_by_username() {
        let api = Arc::new(FakeApi::default().with_thread(
            "erin",
            vec![inbox(55, 9, 1, "есть задача"), inbox(54, 1, 9, "привет")],
        ));
        let d = decoder(&api);

        let msg = d
            .decode(&frame(
                tags::POP_UP_NOTIFY,
                json!({"pop_up_notify": {"data": {"username": "erin"}}}),
            ))
            .await
            .unwrap();

        assert_eq!(msg.from_id, 9);
        assert_eq!(msg.text, "есть задача");
        assert_eq!(msg.inbox_id, 55);
        assert_eq!(api.calls(), vec![Call::FetchThread("erin".into())]);
    }

    #[tokio::test]
    async fn pop_up_notify_missing_pieces_yield_nothing() {
        let api = Arc::new(FakeApi::default());
        let d = decoder(&api);

        for data in [
            json!({}),
            json!({"pop_up_notify": "x"}),
            json!({"pop_up_notify": {"data": null}}),
            json!({"pop_up_notify": {"data": {"username": ""}}}),
            json!({"pop_up_notify": {"data": {"username": 3}}}),
        ] {
            assert!(d.decode(&frame(tags::POP_UP_NOTIFY, data)).await.is_none());
        }
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn pop_up_notify_empty_thread_yields_nothing() {
        let api = Arc::new(FakeApi::default());
        let d = decoder(&api);

        let data = json!({"pop_up_notify": {"data": {"username": "ghost"}}});
        assert!(d.decode(&frame(tags::POP_UP_NOTIFY, data)).await.is_none());
        assert_eq!(api.calls(), vec![Call::FetchThread("ghost".into())]);
    }

    // ── Field helpers ───────────────────────────────────────────────

    #[test]
    fn int_field_truncates_floats() {
        let data = json!({"a": 12.9, "b": -3, "c": true});
        assert_eq!(int_field(&data, "a"), 12);
        assert_eq!(int_field(&data, "b"), -3);
        assert_eq!(int_field(&data, "c"), 0);
        assert_eq!(int_field(&data, "missing"), 0);
        assert_eq!(int_field(&Value::Null, "a"), 0);
    }
}
