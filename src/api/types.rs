//! Records returned by the dialog endpoints.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Field decoder for API records: `null` or a value of the wrong type
/// becomes the field's default instead of failing the whole record.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Preview of the latest message in a dialog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogLastMessage {
    #[serde(deserialize_with = "lenient")]
    pub unread: bool,
    #[serde(deserialize_with = "lenient", rename = "fromUsername")]
    pub from_username: String,
    #[serde(deserialize_with = "lenient", rename = "fromUserId")]
    pub from_user_id: i64,
    #[serde(deserialize_with = "lenient", rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "lenient")]
    pub time: i64,
    #[serde(deserialize_with = "lenient")]
    pub message: String,
}

/// Dialog summary as listed by `dialogs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dialog {
    #[serde(deserialize_with = "lenient")]
    pub unread_count: i64,
    #[serde(deserialize_with = "lenient", rename = "last_message")]
    pub last_message_text: String,
    #[serde(deserialize_with = "lenient")]
    pub time: i64,
    #[serde(deserialize_with = "lenient")]
    pub user_id: i64,
    #[serde(deserialize_with = "lenient")]
    pub username: String,
    #[serde(deserialize_with = "lenient", rename = "profilepicture")]
    pub profile_picture: String,
    #[serde(deserialize_with = "lenient")]
    pub link: String,
    #[serde(deserialize_with = "lenient")]
    pub status: String,
    #[serde(deserialize_with = "lenient")]
    pub blocked_by_user: bool,
    #[serde(deserialize_with = "lenient", rename = "allowedDialog")]
    pub allowed_dialog: bool,
    #[serde(deserialize_with = "lenient", rename = "lastMessage", skip_serializing_if = "Option::is_none")]
    pub last_message: Option<DialogLastMessage>,
    #[serde(deserialize_with = "lenient")]
    pub has_active_order: bool,
    #[serde(deserialize_with = "lenient")]
    pub archived: bool,
    #[serde(deserialize_with = "lenient", rename = "isStarred")]
    pub is_starred: bool,
}

/// One message of a dialog thread as listed by `inboxes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InboxMessage {
    #[serde(deserialize_with = "lenient")]
    pub message_id: i64,
    #[serde(deserialize_with = "lenient")]
    pub to_id: i64,
    #[serde(deserialize_with = "lenient")]
    pub to_username: String,
    #[serde(deserialize_with = "lenient")]
    pub from_id: i64,
    #[serde(deserialize_with = "lenient")]
    pub from_username: String,
    #[serde(deserialize_with = "lenient")]
    pub message: String,
    #[serde(deserialize_with = "lenient")]
    pub time: i64,
    #[serde(deserialize_with = "lenient")]
    pub unread: bool,
    #[serde(deserialize_with = "lenient", rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub status: String,
    #[serde(deserialize_with = "lenient")]
    pub forwarded: bool,
}
