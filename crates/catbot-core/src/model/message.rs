use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    formatting::{format_entities, EntityGroups, MessageEntity, Span},
    model::{chat::Chat, user::User},
};

/// A fully decoded message.
///
/// `text` is the message text, or the caption for media messages. `entities` and
/// `html_text` are derived from whichever entity list belongs to that text.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "WireMessage")]
pub struct Message {
    pub id: MessageId,
    pub chat: Chat,
    pub from: Option<User>,
    /// The channel for channel posts, the group for anonymous admins, or the linked
    /// channel for automatic forwards into a discussion group.
    pub sender_chat: Option<Chat>,
    pub date: i64,
    pub author_signature: Option<String>,

    pub forward_from: Option<User>,
    pub forward_sender_name: Option<String>,
    pub forward_from_chat: Option<Chat>,
    pub forward_from_message_id: Option<MessageId>,
    pub forward_signature: Option<String>,
    pub forward_date: Option<i64>,

    pub reply_to_message: Option<Box<Message>>,
    pub edit_date: Option<i64>,

    pub text: String,
    pub spans: Vec<Span>,
    pub entities: EntityGroups,
    pub html_text: String,
    /// `t.me/c/...` permalink; only supergroups and channels have one.
    pub link: Option<String>,

    pub photo: Vec<PhotoSize>,
    pub new_chat_members: Vec<User>,
    pub left_chat_member: Option<User>,
    pub dice: Option<Dice>,
    pub reply_markup: Option<InlineKeyboard>,
}

#[derive(Deserialize)]
struct WireMessage {
    message_id: MessageId,
    chat: Chat,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    sender_chat: Option<Chat>,
    date: i64,
    #[serde(default)]
    author_signature: Option<String>,
    #[serde(default)]
    forward_from: Option<User>,
    #[serde(default)]
    forward_sender_name: Option<String>,
    #[serde(default)]
    forward_from_chat: Option<Chat>,
    #[serde(default)]
    forward_from_message_id: Option<MessageId>,
    #[serde(default)]
    forward_signature: Option<String>,
    #[serde(default)]
    forward_date: Option<i64>,
    #[serde(default)]
    reply_to_message: Option<Box<Message>>,
    #[serde(default)]
    edit_date: Option<i64>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    entities: Option<Vec<MessageEntity>>,
    #[serde(default)]
    caption_entities: Option<Vec<MessageEntity>>,
    #[serde(default)]
    photo: Vec<PhotoSize>,
    #[serde(default)]
    new_chat_members: Vec<User>,
    #[serde(default)]
    left_chat_member: Option<User>,
    #[serde(default)]
    dice: Option<Dice>,
    #[serde(default)]
    reply_markup: Option<InlineKeyboard>,
}

impl From<WireMessage> for Message {
    fn from(w: WireMessage) -> Self {
        let text = w.text.or(w.caption).unwrap_or_default();
        let spans: Vec<Span> = w
            .entities
            .or(w.caption_entities)
            .unwrap_or_default()
            .into_iter()
            .map(Span::from)
            .collect();
        let formatted = format_entities(&text, &spans);

        Self {
            id: w.message_id,
            link: permalink(w.chat.id, w.message_id),
            chat: w.chat,
            from: w.from,
            sender_chat: w.sender_chat,
            date: w.date,
            author_signature: w.author_signature,
            forward_from: w.forward_from,
            forward_sender_name: w.forward_sender_name,
            forward_from_chat: w.forward_from_chat,
            forward_from_message_id: w.forward_from_message_id,
            forward_signature: w.forward_signature,
            forward_date: w.forward_date,
            reply_to_message: w.reply_to_message,
            edit_date: w.edit_date,
            text,
            spans,
            entities: formatted.groups,
            html_text: formatted.html,
            photo: w.photo,
            new_chat_members: w.new_chat_members,
            left_chat_member: w.left_chat_member,
            dice: w.dice,
            reply_markup: w.reply_markup,
        }
    }
}

/// Supergroup and channel ids carry a `-100` prefix; the public link drops it.
fn permalink(chat_id: ChatId, message_id: MessageId) -> Option<String> {
    chat_id
        .0
        .to_string()
        .strip_prefix("-100")
        .map(|internal| format!("t.me/c/{internal}/{message_id}"))
}

impl Message {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat.id,
            message_id: self.id,
        }
    }

    pub fn is_forward(&self) -> bool {
        self.forward_date.is_some()
            || self.forward_from.is_some()
            || self.forward_sender_name.is_some()
            || self.forward_from_chat.is_some()
    }

    pub fn is_reply(&self) -> bool {
        self.reply_to_message.is_some()
    }

    pub fn is_edited(&self) -> bool {
        self.edit_date.is_some()
    }

    pub fn has_photo(&self) -> bool {
        !self.photo.is_empty()
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.date, 0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub file_unique_id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Dice {
    pub emoji: String,
    pub value: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct File {
    pub file_id: String,
    pub file_unique_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    /// Valid for at least an hour after `getFile`.
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

impl InlineKeyboardButton {
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: Some(url.into()),
            callback_data: None,
        }
    }

    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
            callback_data: Some(data.into()),
        }
    }
}

/// Each inner vector is one row of buttons.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    #[serde(rename = "inline_keyboard")]
    pub rows: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineKeyboardButton>>) -> Self {
        Self { rows }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReplyParameters {
    pub message_id: MessageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<ChatId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_sending_without_reply: Option<bool>,
    /// Must be an exact substring of the replied-to message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_parse_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_entities: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checklist_task_id: Option<i64>,
}

impl ReplyParameters {
    pub fn to(message_id: MessageId) -> Self {
        Self {
            message_id,
            ..Default::default()
        }
    }
}
