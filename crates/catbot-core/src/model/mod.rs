//! Bot API payloads, decoded with serde.
//!
//! Optional wire fields stay `Option` (or an empty collection); nothing is
//! presence-checked after decode.

pub mod chat;
pub mod message;
pub mod payloads;
pub mod user;

pub use chat::{Chat, ChatInviteLink, ChatKind, ChatMember, ChatPermissions, MemberStatus};
pub use message::{
    Dice, File, InlineKeyboard, InlineKeyboardButton, Message, PhotoSize, ReplyParameters,
};
pub use payloads::{CallbackQuery, ChatJoinRequest, ChatMemberUpdate};
pub use user::User;
