use serde::{Deserialize, Serialize};

use crate::domain::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    // Only returned by getMe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_join_groups: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_read_all_group_messages: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_inline_queries: Option<bool>,
}

impl User {
    /// Display name: first name, plus last name when present.
    pub fn name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }

    /// Public `t.me` link, only for users with a username.
    pub fn link(&self) -> Option<String> {
        self.username.as_ref().map(|u| format!("t.me/{u}"))
    }

    /// Deep link that opens the user's profile; works without a username.
    pub fn deep_link(&self) -> String {
        format!("tg://user?id={}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_user() {
        let u: User = serde_json::from_value(serde_json::json!({
            "id": 42, "is_bot": false, "first_name": "Ada"
        }))
        .unwrap();
        assert_eq!(u.name(), "Ada");
        assert_eq!(u.link(), None);
        assert_eq!(u.deep_link(), "tg://user?id=42");
    }

    #[test]
    fn full_name_and_link() {
        let u: User = serde_json::from_value(serde_json::json!({
            "id": 7, "is_bot": true, "first_name": "Cat", "last_name": "Bot", "username": "catbot"
        }))
        .unwrap();
        assert_eq!(u.name(), "Cat Bot");
        assert_eq!(u.link().as_deref(), Some("t.me/catbot"));
    }
}
