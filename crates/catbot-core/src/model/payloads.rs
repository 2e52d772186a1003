//! Payloads of the non-message update kinds.

use serde::Deserialize;

use crate::model::{
    chat::{Chat, ChatInviteLink, ChatMember},
    message::Message,
    user::User,
};

/// A button press on an inline keyboard.
///
/// Only queries whose originating message is still available are ever built;
/// see [`CallbackQuery::from_wire`].
#[derive(Clone, Debug, PartialEq)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Message,
    pub chat_instance: String,
    pub data: Option<String>,
    pub inline_message_id: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct WireCallbackQuery {
    id: String,
    from: User,
    #[serde(default)]
    message: Option<Message>,
    chat_instance: String,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    inline_message_id: Option<String>,
}

impl CallbackQuery {
    /// `None` when the originating message is missing (too old, or an inline message).
    pub(crate) fn from_wire(w: WireCallbackQuery) -> Option<Self> {
        Some(Self {
            id: w.id,
            from: w.from,
            message: w.message?,
            chat_instance: w.chat_instance,
            data: w.data,
            inline_message_id: w.inline_message_id,
        })
    }

    pub fn data(&self) -> &str {
        self.data.as_deref().unwrap_or("")
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChatMemberUpdate {
    pub chat: Chat,
    pub from: User,
    pub date: i64,
    pub old_chat_member: ChatMember,
    pub new_chat_member: ChatMember,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChatJoinRequest {
    pub chat: Chat,
    pub from: User,
    /// Private chat with the requester, usable for five minutes.
    pub user_chat_id: i64,
    pub date: i64,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub invite_link: Option<ChatInviteLink>,
}
