//! Classification of raw updates into typed events.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    domain::UpdateId,
    model::{
        payloads::WireCallbackQuery, CallbackQuery, ChatJoinRequest, ChatMemberUpdate, Message,
    },
};

/// One update record exactly as returned by `getUpdates`.
pub type RawUpdate = Value;

/// Update kinds requested from the server. Only some of them become [`Event`]s;
/// the rest are skipped by [`classify`].
pub const ALLOWED_UPDATES: &[&str] = &[
    "message",
    "edited_message",
    "channel_post",
    "edited_channel_post",
    "inline_query",
    "chosen_inline_result",
    "callback_query",
    "shipping_query",
    "pre_checkout_query",
    "poll",
    "poll_answer",
    "my_chat_member",
    "chat_member",
    "chat_join_request",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    CallbackQuery,
    ChatMember,
    MyChatMember,
    ChatJoinRequest,
}

/// A classified, fully decoded update.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Message(Message),
    CallbackQuery(CallbackQuery),
    /// A member's status changed. `for_self` is true when the member is the bot.
    ChatMember {
        update: ChatMemberUpdate,
        for_self: bool,
    },
    ChatJoinRequest(ChatJoinRequest),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Message(_) => EventKind::Message,
            Event::CallbackQuery(_) => EventKind::CallbackQuery,
            Event::ChatMember {
                for_self: false, ..
            } => EventKind::ChatMember,
            Event::ChatMember { for_self: true, .. } => EventKind::MyChatMember,
            Event::ChatJoinRequest(_) => EventKind::ChatJoinRequest,
        }
    }
}

pub fn update_id(raw: &RawUpdate) -> Option<UpdateId> {
    raw.get("update_id").and_then(Value::as_i64)
}

/// Turn one raw update into at most one event.
///
/// Keys are checked in a fixed order (`message`, `callback_query`, `chat_member`,
/// `my_chat_member`, `chat_join_request`) because a record may carry several.
/// Callback queries without their originating message, unknown kinds and payloads
/// that fail to decode yield `None`.
pub fn classify(raw: RawUpdate) -> Option<Event> {
    let Value::Object(mut obj) = raw else {
        warn!("update is not a JSON object; dropping");
        return None;
    };

    if let Some(v) = obj.remove("message") {
        return decode::<Message>(&obj, "message", v).map(Event::Message);
    }
    if let Some(v) = obj.remove("callback_query") {
        let wire = decode::<WireCallbackQuery>(&obj, "callback_query", v)?;
        let query = CallbackQuery::from_wire(wire);
        if query.is_none() {
            let id = obj.get("update_id").and_then(Value::as_i64);
            debug!(update_id = id, "callback query without message; dropping");
        }
        return query.map(Event::CallbackQuery);
    }
    if let Some(v) = obj.remove("chat_member") {
        return decode::<ChatMemberUpdate>(&obj, "chat_member", v).map(|update| {
            Event::ChatMember {
                update,
                for_self: false,
            }
        });
    }
    if let Some(v) = obj.remove("my_chat_member") {
        return decode::<ChatMemberUpdate>(&obj, "my_chat_member", v).map(|update| {
            Event::ChatMember {
                update,
                for_self: true,
            }
        });
    }
    if let Some(v) = obj.remove("chat_join_request") {
        return decode::<ChatJoinRequest>(&obj, "chat_join_request", v)
            .map(Event::ChatJoinRequest);
    }

    None
}

fn decode<T: DeserializeOwned>(rest: &Map<String, Value>, key: &str, v: Value) -> Option<T> {
    match serde_json::from_value(v) {
        Ok(t) => Some(t),
        Err(e) => {
            let id = rest.get("update_id").and_then(Value::as_i64);
            warn!(update_id = id, kind = key, "failed to decode update payload: {e}");
            None
        }
    }
}
