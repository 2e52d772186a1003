use serde::{Deserialize, Serialize};

use crate::{domain::ChatId, model::message::Message, model::user::User};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
    Other(String),
}

impl From<String> for ChatKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "private" => ChatKind::Private,
            "group" => ChatKind::Group,
            "supergroup" => ChatKind::Supergroup,
            "channel" => ChatKind::Channel,
            _ => ChatKind::Other(s),
        }
    }
}

impl<'de> Deserialize<'de> for ChatKind {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d).map(ChatKind::from)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub kind: ChatKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,

    // Only returned by getChat.
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pinned_message: Option<Box<Message>>,
    #[serde(default)]
    pub slow_mode_delay: Option<u32>,
    #[serde(default)]
    pub join_by_request: Option<bool>,
    #[serde(default)]
    pub linked_chat_id: Option<ChatId>,
    #[serde(default)]
    pub invite_link: Option<String>,
}

impl Chat {
    pub fn is_group_like(&self) -> bool {
        matches!(
            self.kind,
            ChatKind::Group | ChatKind::Supergroup | ChatKind::Channel
        )
    }

    /// Title for groups and channels, the person's name for private chats.
    pub fn name(&self) -> String {
        if self.is_group_like() {
            return self.title.clone().unwrap_or_default();
        }
        let first = self.first_name.as_deref().unwrap_or("");
        match &self.last_name {
            Some(last) => format!("{first} {last}"),
            None => first.to_string(),
        }
    }

    pub fn link(&self) -> Option<String> {
        self.username.as_ref().map(|u| format!("t.me/{u}"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
    Other(String),
}

impl<'de> Deserialize<'de> for MemberStatus {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(match s.as_str() {
            "creator" => MemberStatus::Creator,
            "administrator" => MemberStatus::Administrator,
            "member" => MemberStatus::Member,
            "restricted" => MemberStatus::Restricted,
            "left" => MemberStatus::Left,
            "kicked" => MemberStatus::Kicked,
            _ => MemberStatus::Other(s),
        })
    }
}

/// Send permissions, used both for restricting members and for reading a
/// restricted member's current state. Unset fields are omitted on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPermissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_send_messages: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_send_audios: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_send_documents: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_send_photos: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_send_videos: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_send_video_notes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_send_voice_notes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_send_polls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_send_other_messages: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_add_web_page_previews: Option<bool>,
}

impl ChatPermissions {
    /// Every send permission set to `allowed`.
    pub fn uniform(allowed: bool) -> Self {
        let v = Some(allowed);
        Self {
            can_send_messages: v,
            can_send_audios: v,
            can_send_documents: v,
            can_send_photos: v,
            can_send_videos: v,
            can_send_video_notes: v,
            can_send_voice_notes: v,
            can_send_polls: v,
            can_send_other_messages: v,
            can_add_web_page_previews: v,
        }
    }

    pub fn can_send_messages(&self) -> bool {
        self.can_send_messages.unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChatMember {
    pub user: User,
    pub status: MemberStatus,

    // Administrators and the creator.
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub custom_title: Option<String>,
    #[serde(default)]
    pub can_be_edited: bool,
    #[serde(default)]
    pub can_delete_messages: bool,
    #[serde(default)]
    pub can_promote_members: bool,
    #[serde(default)]
    pub can_post_messages: bool,
    #[serde(default)]
    pub can_edit_messages: bool,

    // Administrators and restricted members.
    #[serde(default)]
    pub can_change_info: bool,
    #[serde(default)]
    pub can_invite_users: bool,
    #[serde(default)]
    pub can_pin_messages: Option<bool>,

    // Restricted and kicked members.
    #[serde(default)]
    pub until_date: Option<i64>,
    #[serde(default)]
    pub is_member: Option<bool>,
    #[serde(flatten)]
    pub restrictions: ChatPermissions,
}

impl ChatMember {
    pub fn is_admin(&self) -> bool {
        matches!(
            self.status,
            MemberStatus::Creator | MemberStatus::Administrator
        )
    }

    pub fn is_member(&self) -> bool {
        self.is_member
            .unwrap_or(!matches!(self.status, MemberStatus::Left | MemberStatus::Kicked))
    }

    /// Effective send permissions: only restricted members carry limits.
    pub fn permissions(&self) -> ChatPermissions {
        if self.status == MemberStatus::Restricted {
            self.restrictions.clone()
        } else {
            ChatPermissions::uniform(true)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChatInviteLink {
    pub invite_link: String,
    pub creator: User,
    pub creates_join_request: bool,
    pub is_primary: bool,
    pub is_revoked: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub expire_date: Option<i64>,
    #[serde(default)]
    pub member_limit: Option<u32>,
    #[serde(default)]
    pub pending_join_request_count: Option<u32>,
}
