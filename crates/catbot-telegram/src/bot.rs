//! Typed Bot API client over any [`Transport`].

use std::{path::Path, sync::Arc, time::Duration};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{debug, info};

use catbot_core::{
    api_error::DomainError,
    domain::{ChatId, MessageId, MessageRef, UpdateId, UserId},
    errors::Error,
    model::{
        Chat, ChatMember, ChatPermissions, File, InlineKeyboard, MemberStatus, Message,
        ReplyParameters, User,
    },
    ports::Transport,
    update::{RawUpdate, ALLOWED_UPDATES},
    Result,
};

/// Plain text longer than this is sent as several numbered messages.
pub const SPLIT_LIMIT: usize = 4000;
const SPLIT_PAUSE: Duration = Duration::from_millis(500);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Restrictions ending sooner than this are treated as already over.
const RESTRICTION_SLACK_SECS: i64 = 35;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
    MarkdownV2,
    Markdown,
}

/// Optional fields shared by `sendMessage` and `editMessageText`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SendOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_web_page_preview: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_notification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_parameters: Option<ReplyParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboard>,
}

impl SendOptions {
    pub fn html() -> Self {
        Self {
            parse_mode: Some(ParseMode::Html),
            ..Default::default()
        }
    }

    pub fn reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_parameters = Some(ReplyParameters::to(message_id));
        self
    }

    pub fn keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.reply_markup = Some(keyboard);
        self
    }

    pub fn silent(mut self) -> Self {
        self.disable_notification = Some(true);
        self
    }

    pub fn no_preview(mut self) -> Self {
        self.disable_web_page_preview = Some(true);
        self
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AnswerOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_alert: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_time: Option<u32>,
}

impl AnswerOptions {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn alert(mut self) -> Self {
        self.show_alert = Some(true);
        self
    }
}

/// The bot account plus the calls it can make.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Bot {
    transport: Arc<dyn Transport>,
    me: User,
    request_timeout: Duration,
}

impl Bot {
    /// Identify the bot with `getMe`.
    pub async fn connect(transport: Arc<dyn Transport>) -> Result<Self> {
        let me: User = call(&*transport, "getMe", json!({}), DEFAULT_REQUEST_TIMEOUT).await?;
        info!(id = me.id.0, username = ?me.username, "connected as {}", me.name());
        Ok(Self {
            transport,
            me,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn me(&self) -> &User {
        &self.me
    }

    pub fn username(&self) -> &str {
        self.me.username.as_deref().unwrap_or("")
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, payload: Value) -> Result<T> {
        call(&*self.transport, method, payload, self.request_timeout).await
    }

    /// Like `call`, but API failures come back as [`Error::Domain`].
    async fn call_classified<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: Value,
    ) -> Result<T> {
        self.call(method, payload).await.map_err(Error::classify)
    }

    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", json!({})).await
    }

    /// One `getUpdates` round trip. The engine's poller does this itself; this is
    /// for callers that want to poll by hand.
    pub async fn get_updates(
        &self,
        offset: UpdateId,
        timeout: Duration,
    ) -> Result<Vec<RawUpdate>> {
        let payload = json!({
            "offset": offset,
            "timeout": timeout.as_secs(),
            "allowed_updates": ALLOWED_UPDATES,
        });
        call(&*self.transport, "getUpdates", payload, timeout + POLL_GRACE).await
    }

    /// Send a text message and return it.
    ///
    /// Without a parse mode, text over [`SPLIT_LIMIT`] characters goes out as
    /// numbered parts half a second apart; the last part is returned.
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        opts: &SendOptions,
    ) -> Result<Message> {
        if opts.parse_mode.is_some() || text.chars().count() <= SPLIT_LIMIT {
            return self.send_one(chat_id, text, opts).await;
        }

        let parts = split_text(text, SPLIT_LIMIT);
        let total = parts.len();
        debug!(chat_id = chat_id.0, total, "splitting long message");
        let mut last = None;
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                sleep(SPLIT_PAUSE).await;
            }
            let numbered = format!("{part}\n\n({} / {total})", i + 1);
            last = Some(self.send_one(chat_id, &numbered, opts).await?);
        }
        last.ok_or_else(|| Error::External("split produced no parts".to_string()))
    }

    async fn send_one(&self, chat_id: ChatId, text: &str, opts: &SendOptions) -> Result<Message> {
        let mut payload = json!({"chat_id": chat_id, "text": text});
        merge_options(&mut payload, opts)?;
        self.call("sendMessage", payload).await
    }

    /// Replace a message's text. `Ok(None)` when the new content equals the old.
    pub async fn edit_message(
        &self,
        msg: MessageRef,
        text: &str,
        opts: &SendOptions,
    ) -> Result<Option<Message>> {
        let mut payload = json!({
            "chat_id": msg.chat_id,
            "message_id": msg.message_id,
            "text": text,
        });
        merge_options(&mut payload, opts)?;

        match self.call("editMessageText", payload).await {
            Ok(m) => Ok(Some(m)),
            Err(e) => match e.api_description() {
                Some(d) if d.contains("message is not modified") => Ok(None),
                Some(d) if d.contains("message to edit not found") => {
                    Err(DomainError::MessageNotFound(d.to_string()).into())
                }
                _ => Err(e),
            },
        }
    }

    pub async fn forward_message(
        &self,
        from_chat_id: ChatId,
        to_chat_id: ChatId,
        message_id: MessageId,
        disable_notification: bool,
    ) -> Result<Message> {
        self.call(
            "forwardMessage",
            json!({
                "from_chat_id": from_chat_id,
                "chat_id": to_chat_id,
                "message_id": message_id,
                "disable_notification": disable_notification,
            }),
        )
        .await
    }

    /// Should be called for every callback query, even with nothing to show.
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        opts: &AnswerOptions,
    ) -> Result<bool> {
        let mut payload = json!({"callback_query_id": callback_query_id});
        merge_options(&mut payload, opts)?;
        self.call("answerCallbackQuery", payload).await
    }

    pub async fn get_chat(&self, chat_id: ChatId) -> Result<Chat> {
        self.call_classified("getChat", json!({"chat_id": chat_id}))
            .await
    }

    pub async fn get_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<ChatMember> {
        self.call_classified(
            "getChatMember",
            json!({"chat_id": chat_id, "user_id": user_id}),
        )
        .await
    }

    /// `until` is unix time; less than 30 s or more than 366 days from now means forever.
    pub async fn restrict_chat_member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        until: i64,
        permissions: &ChatPermissions,
        use_independent_chat_permissions: bool,
    ) -> Result<bool> {
        self.call_classified(
            "restrictChatMember",
            json!({
                "chat_id": chat_id,
                "user_id": user_id,
                "until_date": until,
                "use_independent_chat_permissions": use_independent_chat_permissions,
                "permissions": permissions,
            }),
        )
        .await
    }

    /// Revoke every send permission until `until`.
    pub async fn silence_chat_member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        until: i64,
    ) -> Result<bool> {
        self.restrict_chat_member(chat_id, user_id, until, &ChatPermissions::uniform(false), false)
            .await
    }

    /// Grant every send permission. The restriction record expires shortly after.
    pub async fn lift_restrictions(&self, chat_id: ChatId, user_id: UserId) -> Result<bool> {
        let until = chrono::Utc::now().timestamp() + RESTRICTION_SLACK_SECS;
        self.restrict_chat_member(chat_id, user_id, until, &ChatPermissions::uniform(true), false)
            .await
    }

    /// Remove a member. With `no_ban` the user may rejoin at once; `until` of 0 bans forever.
    pub async fn kick_chat_member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        until: i64,
        no_ban: bool,
    ) -> Result<bool> {
        if no_ban {
            // Unbanning a current member removes them without a ban.
            return self
                .call_classified(
                    "unbanChatMember",
                    json!({"chat_id": chat_id, "user_id": user_id}),
                )
                .await;
        }
        self.call_classified(
            "banChatMember",
            json!({"chat_id": chat_id, "user_id": user_id, "until_date": until}),
        )
        .await
    }

    /// Lift a ban. Members who are not banned are left alone.
    pub async fn unban_chat_member(&self, chat_id: ChatId, user_id: UserId) -> Result<bool> {
        self.call_classified(
            "unbanChatMember",
            json!({"chat_id": chat_id, "user_id": user_id, "only_if_banned": true}),
        )
        .await
    }

    pub async fn delete_message(&self, msg: MessageRef) -> Result<bool> {
        self.call_classified(
            "deleteMessage",
            json!({"chat_id": msg.chat_id, "message_id": msg.message_id}),
        )
        .await
    }

    pub async fn approve_chat_join_request(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<bool> {
        self.call_classified(
            "approveChatJoinRequest",
            json!({"chat_id": chat_id, "user_id": user_id}),
        )
        .await
    }

    pub async fn decline_chat_join_request(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<bool> {
        self.call_classified(
            "declineChatJoinRequest",
            json!({"chat_id": chat_id, "user_id": user_id}),
        )
        .await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File> {
        self.call("getFile", json!({"file_id": file_id}))
            .await
            .map_err(|e| match e.api_description() {
                Some(d) if d.contains("invalid file_id") => {
                    DomainError::InvalidFileId(d.to_string()).into()
                }
                _ => e,
            })
    }

    pub async fn download(&self, file: &File) -> Result<Vec<u8>> {
        let Some(path) = file.file_path.as_deref() else {
            return Err(DomainError::FilePath("File path not found.".to_string()).into());
        };
        self.transport.download(path).await
    }

    pub async fn download_to(&self, file: &File, dest: impl AsRef<Path>) -> Result<()> {
        let bytes = self.download(file).await?;
        tokio::fs::write(dest.as_ref(), bytes).await?;
        Ok(())
    }

    /// True when `msg` starts with `/cmd` or `/cmd@<bot username>`.
    ///
    /// With `require_username`, only the addressed form counts.
    pub fn detect_command(&self, cmd: &str, msg: &Message, require_username: bool) -> bool {
        let commands = &msg.entities.commands;
        if !require_username && commands.iter().any(|c| c == cmd) {
            return msg.text.starts_with(cmd);
        }
        let addressed = format!("{cmd}@{}", self.username());
        if commands.iter().any(|c| *c == addressed) {
            return msg.text.starts_with(&addressed);
        }
        false
    }

    /// Undo a temporary unrestriction while keeping an earlier restriction in force.
    ///
    /// Kicked members are skipped. A `restricted_until` that is zero or further
    /// out than the slack window is re-applied as a silence; otherwise all
    /// restrictions are lifted. Failures caused by the member being an admin, the
    /// bot lacking rights, or the user being gone are ignored.
    pub async fn lift_and_preserve_restriction(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        restricted_until: i64,
    ) -> Result<()> {
        let member = self.get_chat_member(chat_id, user_id).await?;
        if member.status == MemberStatus::Kicked {
            return Ok(());
        }

        let now = chrono::Utc::now().timestamp();
        let res = if restricted_until != 0 && restricted_until <= now + RESTRICTION_SLACK_SECS {
            self.lift_restrictions(chat_id, user_id).await
        } else {
            self.silence_chat_member(chat_id, user_id, restricted_until)
                .await
        };

        match res {
            Ok(_) => Ok(()),
            Err(Error::Domain(
                DomainError::RestrictAdmin(d)
                | DomainError::InsufficientRight(d)
                | DomainError::UserNotFound(d),
            )) => {
                debug!(chat_id = chat_id.0, user_id = user_id.0, "restriction not changed: {d}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

async fn call<T: DeserializeOwned>(
    transport: &dyn Transport,
    method: &str,
    payload: Value,
    timeout: Duration,
) -> Result<T> {
    let result = transport.call(method, payload, timeout).await?;
    serde_json::from_value(result).map_err(|e| Error::Decode(format!("{method}: {e}")))
}

fn merge_options(payload: &mut Value, opts: &impl Serialize) -> Result<()> {
    if let (Value::Object(target), Value::Object(extra)) = (payload, serde_json::to_value(opts)?) {
        target.extend(extra);
    }
    Ok(())
}

/// Split on character boundaries into chunks of at most `limit` characters.
fn split_text(text: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catbot_core::{api_error::DomainErrorKind, model::InlineKeyboardButton};
    use std::sync::Mutex;

    type Responder = Box<dyn Fn(&str, &Value) -> Result<Value> + Send + Sync>;

    /// Records every call and answers through `respond`.
    struct FakeApi {
        calls: Mutex<Vec<(String, Value)>>,
        respond: Responder,
        files: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn new(
            respond: impl Fn(&str, &Value) -> Result<Value> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
                files: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().unwrap().clone()
        }

        fn methods(&self) -> Vec<String> {
            self.calls().into_iter().map(|(m, _)| m).collect()
        }
    }

    #[async_trait]
    impl Transport for FakeApi {
        async fn call(&self, method: &str, payload: Value, _timeout: Duration) -> Result<Value> {
            if method == "getMe" {
                return Ok(json!({
                    "id": 42, "is_bot": true, "first_name": "Cat", "username": "catbot"
                }));
            }
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), payload.clone()));
            (self.respond)(method, &payload)
        }

        async fn download(&self, file_path: &str) -> Result<Vec<u8>> {
            self.files.lock().unwrap().push(file_path.to_string());
            Ok(b"file-bytes".to_vec())
        }
    }

    fn api_err(method: &str, description: &str) -> Error {
        Error::Api {
            method: method.to_string(),
            description: description.to_string(),
        }
    }

    fn echo_message(payload: &Value) -> Value {
        json!({
            "message_id": 100,
            "date": 0,
            "chat": {"id": payload["chat_id"], "type": "private", "first_name": "A"},
            "text": payload["text"]
        })
    }

    fn incoming(text: &str, commands: &[(usize, usize)]) -> Message {
        let entities: Vec<Value> = commands
            .iter()
            .map(|(o, l)| json!({"type": "bot_command", "offset": o, "length": l}))
            .collect();
        serde_json::from_value(json!({
            "message_id": 1,
            "date": 0,
            "chat": {"id": -1001, "type": "supergroup", "title": "G"},
            "text": text,
            "entities": entities
        }))
        .unwrap()
    }

    async fn bot(api: &Arc<FakeApi>) -> Bot {
        Bot::connect(api.clone()).await.unwrap()
    }

    #[tokio::test]
    async fn connect_identifies_the_bot() {
        let api = FakeApi::new(|_, _| Ok(Value::Null));
        let bot = bot(&api).await;
        assert_eq!(bot.me().id, UserId(42));
        assert_eq!(bot.username(), "catbot");
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn short_message_is_sent_once_with_options() {
        let api = FakeApi::new(|_, p| Ok(echo_message(p)));
        let bot = bot(&api).await;
        let opts = SendOptions::html()
            .reply_to(MessageId(7))
            .keyboard(InlineKeyboard::new(vec![vec![InlineKeyboardButton::callback(
                "Yes", "yes",
            )]]));

        let sent = bot.send_message(ChatId(5), "<b>hi</b>", &opts).await.unwrap();

        assert_eq!(sent.text, "<b>hi</b>");
        let calls = api.calls();
        assert_eq!(calls.len(), 1);
        let (method, payload) = &calls[0];
        assert_eq!(method, "sendMessage");
        assert_eq!(payload["chat_id"], 5);
        assert_eq!(payload["parse_mode"], "HTML");
        assert_eq!(payload["reply_parameters"], json!({"message_id": 7}));
        assert_eq!(
            payload["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            "yes"
        );
        assert!(payload.get("disable_notification").is_none());
    }

    #[tokio::test]
    async fn long_plain_text_is_split_and_numbered() {
        let api = FakeApi::new(|_, p| Ok(echo_message(p)));
        let bot = bot(&api).await;
        let text = format!("{}{}", "é".repeat(SPLIT_LIMIT), "tail");

        let last = bot
            .send_message(ChatId(5), &text, &SendOptions::default())
            .await
            .unwrap();

        let texts: Vec<String> = api
            .calls()
            .into_iter()
            .map(|(_, p)| p["text"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], format!("{}\n\n(1 / 2)", "é".repeat(SPLIT_LIMIT)));
        assert_eq!(texts[1], "tail\n\n(2 / 2)");
        assert_eq!(last.text, "tail\n\n(2 / 2)");
    }

    #[tokio::test]
    async fn long_text_with_parse_mode_is_not_split() {
        let api = FakeApi::new(|_, p| Ok(echo_message(p)));
        let bot = bot(&api).await;
        let text = "x".repeat(SPLIT_LIMIT * 2);
        bot.send_message(ChatId(5), &text, &SendOptions::html())
            .await
            .unwrap();
        assert_eq!(api.methods(), vec!["sendMessage"]);
    }

    #[tokio::test]
    async fn exact_multiple_of_limit_has_no_empty_part() {
        let api = FakeApi::new(|_, p| Ok(echo_message(p)));
        let bot = bot(&api).await;
        let text = "y".repeat(SPLIT_LIMIT * 2);
        bot.send_message(ChatId(5), &text, &SendOptions::default())
            .await
            .unwrap();
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn edit_message_maps_known_failures() {
        let api = FakeApi::new(|_, p| match p["text"].as_str() {
            Some("same") => Err(api_err(
                "editMessageText",
                "Bad Request: message is not modified: specified new message content is exactly the same",
            )),
            Some("gone") => Err(api_err(
                "editMessageText",
                "Bad Request: message to edit not found",
            )),
            Some("bad") => Err(api_err("editMessageText", "Bad Request: can't parse entities")),
            _ => Ok(echo_message(p)),
        });
        let bot = bot(&api).await;
        let target = MessageRef {
            chat_id: ChatId(5),
            message_id: MessageId(9),
        };
        let opts = SendOptions::default();

        let edited = bot.edit_message(target, "new", &opts).await.unwrap();
        assert_eq!(edited.map(|m| m.text), Some("new".to_string()));
        assert_eq!(bot.edit_message(target, "same", &opts).await.unwrap(), None);

        match bot.edit_message(target, "gone", &opts).await {
            Err(Error::Domain(e)) => assert_eq!(e.kind(), DomainErrorKind::MessageNotFound),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            bot.edit_message(target, "bad", &opts).await,
            Err(Error::Api { .. })
        ));
        assert_eq!(api.calls()[0].1["message_id"], 9);
    }

    #[tokio::test]
    async fn state_changing_calls_classify_failures() {
        let api = FakeApi::new(|m, _| match m {
            "deleteMessage" => Err(api_err(m, "Bad Request: message to delete not found")),
            "getChat" => Err(api_err(m, "Bad Request: chat not found")),
            "approveChatJoinRequest" => Err(api_err(m, "Bad Request: USER_ALREADY_PARTICIPANT")),
            "declineChatJoinRequest" => Err(api_err(m, "Bad Request: HIDE_REQUESTER_MISSING")),
            _ => Err(api_err(m, "Too Many Requests: retry after 5")),
        });
        let bot = bot(&api).await;
        let msg = MessageRef {
            chat_id: ChatId(1),
            message_id: MessageId(2),
        };

        let kind = |r: Result<bool>| match r {
            Err(Error::Domain(e)) => e.kind(),
            other => panic!("unexpected: {other:?}"),
        };
        assert_eq!(kind(bot.delete_message(msg).await), DomainErrorKind::DeleteMessage);
        assert_eq!(
            kind(bot.approve_chat_join_request(ChatId(1), UserId(3)).await),
            DomainErrorKind::JoinRequestUserAlreadyParticipant
        );
        assert_eq!(
            kind(bot.decline_chat_join_request(ChatId(1), UserId(3)).await),
            DomainErrorKind::JoinRequestNotFound
        );
        assert_eq!(
            kind(bot.unban_chat_member(ChatId(1), UserId(3)).await),
            DomainErrorKind::Generic
        );
        match bot.get_chat(ChatId(1)).await {
            Err(Error::Domain(DomainError::ChatNotFound(d))) => {
                assert_eq!(d, "Bad Request: chat not found")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn kick_and_unban_payloads() {
        let api = FakeApi::new(|_, _| Ok(json!(true)));
        let bot = bot(&api).await;

        assert!(bot.kick_chat_member(ChatId(1), UserId(3), 0, false).await.unwrap());
        assert!(bot.kick_chat_member(ChatId(1), UserId(3), 0, true).await.unwrap());
        assert!(bot.unban_chat_member(ChatId(1), UserId(3)).await.unwrap());

        let calls = api.calls();
        assert_eq!(calls[0].0, "banChatMember");
        assert_eq!(calls[0].1["until_date"], 0);
        assert_eq!(calls[1].0, "unbanChatMember");
        assert!(calls[1].1.get("only_if_banned").is_none());
        assert_eq!(calls[2].0, "unbanChatMember");
        assert_eq!(calls[2].1["only_if_banned"], true);
    }

    #[tokio::test]
    async fn silence_and_lift_set_uniform_permissions() {
        let api = FakeApi::new(|_, _| Ok(json!(true)));
        let bot = bot(&api).await;

        bot.silence_chat_member(ChatId(1), UserId(3), 5).await.unwrap();
        let before = chrono::Utc::now().timestamp();
        bot.lift_restrictions(ChatId(1), UserId(3)).await.unwrap();

        let calls = api.calls();
        let silenced = &calls[0].1;
        assert_eq!(calls[0].0, "restrictChatMember");
        assert_eq!(silenced["until_date"], 5);
        let perms = silenced["permissions"].as_object().unwrap();
        assert_eq!(perms.len(), 10);
        assert!(perms.values().all(|v| *v == json!(false)));

        let lifted = &calls[1].1;
        assert!(lifted["permissions"]
            .as_object()
            .unwrap()
            .values()
            .all(|v| *v == json!(true)));
        let until = lifted["until_date"].as_i64().unwrap();
        assert!(until >= before + 35 && until <= before + 37);
    }

    fn member_json(status: &str) -> Value {
        json!({
            "status": status,
            "user": {"id": 3, "is_bot": false, "first_name": "M"}
        })
    }

    #[tokio::test]
    async fn preserve_restriction_skips_kicked_members() {
        let api = FakeApi::new(|_, _| Ok(member_json("kicked")));
        let bot = bot(&api).await;
        bot.lift_and_preserve_restriction(ChatId(1), UserId(3), 0)
            .await
            .unwrap();
        assert_eq!(api.methods(), vec!["getChatMember"]);
    }

    #[tokio::test]
    async fn preserve_restriction_reapplies_a_future_restriction() {
        let api = FakeApi::new(|m, _| match m {
            "getChatMember" => Ok(member_json("member")),
            _ => Ok(json!(true)),
        });
        let bot = bot(&api).await;
        let until = chrono::Utc::now().timestamp() + 3600;

        bot.lift_and_preserve_restriction(ChatId(1), UserId(3), until)
            .await
            .unwrap();

        let calls = api.calls();
        assert_eq!(calls[1].0, "restrictChatMember");
        assert_eq!(calls[1].1["until_date"], until);
        assert_eq!(calls[1].1["permissions"]["can_send_messages"], false);
    }

    #[tokio::test]
    async fn preserve_restriction_lifts_an_expiring_restriction() {
        let api = FakeApi::new(|m, _| match m {
            "getChatMember" => Ok(member_json("restricted")),
            _ => Ok(json!(true)),
        });
        let bot = bot(&api).await;
        let until = chrono::Utc::now().timestamp() + 10;

        bot.lift_and_preserve_restriction(ChatId(1), UserId(3), until)
            .await
            .unwrap();

        let calls = api.calls();
        assert_eq!(calls[1].1["permissions"]["can_send_messages"], true);
    }

    #[tokio::test]
    async fn preserve_restriction_swallows_admin_failures_only() {
        let api = FakeApi::new(|m, _| match m {
            "getChatMember" => Ok(member_json("administrator")),
            _ => Err(api_err(m, "Bad Request: user is an administrator of the chat")),
        });
        let bot = bot(&api).await;
        bot.lift_and_preserve_restriction(ChatId(1), UserId(3), 0)
            .await
            .unwrap();

        let api = FakeApi::new(|m, _| Err(api_err(m, "Bad Request: chat not found")));
        let bot = Bot::connect(api.clone()).await.unwrap();
        match bot.lift_and_preserve_restriction(ChatId(1), UserId(3), 0).await {
            Err(Error::Domain(e)) => assert_eq!(e.kind(), DomainErrorKind::ChatNotFound),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn files_lookup_and_download() {
        let api = FakeApi::new(|_, p| match p["file_id"].as_str() {
            Some("good") => Ok(json!({
                "file_id": "good", "file_unique_id": "u", "file_path": "docs/a.txt"
            })),
            Some("nopath") => Ok(json!({"file_id": "nopath", "file_unique_id": "u"})),
            _ => Err(api_err("getFile", "Bad Request: invalid file_id")),
        });
        let bot = bot(&api).await;

        match bot.get_file("junk").await {
            Err(Error::Domain(e)) => assert_eq!(e.kind(), DomainErrorKind::InvalidFileId),
            other => panic!("unexpected: {other:?}"),
        }

        let missing = bot.get_file("nopath").await.unwrap();
        match bot.download(&missing).await {
            Err(Error::Domain(e)) => assert_eq!(e.kind(), DomainErrorKind::FilePath),
            other => panic!("unexpected: {other:?}"),
        }

        let file = bot.get_file("good").await.unwrap();
        assert_eq!(bot.download(&file).await.unwrap(), b"file-bytes".to_vec());

        let dest = std::env::temp_dir().join(format!("catbot-download-{}.bin", std::process::id()));
        bot.download_to(&file, &dest).await.unwrap();
        let written = std::fs::read(&dest).unwrap();
        let _ = std::fs::remove_file(&dest);
        assert_eq!(written, b"file-bytes");
        assert_eq!(*api.files.lock().unwrap(), vec!["docs/a.txt", "docs/a.txt"]);
    }

    #[tokio::test]
    async fn answer_callback_query_sends_options() {
        let api = FakeApi::new(|_, _| Ok(json!(true)));
        let bot = bot(&api).await;
        assert!(bot
            .answer_callback_query("q1", &AnswerOptions::text("done").alert())
            .await
            .unwrap());
        let (method, payload) = &api.calls()[0];
        assert_eq!(method, "answerCallbackQuery");
        assert_eq!(
            *payload,
            json!({"callback_query_id": "q1", "text": "done", "show_alert": true})
        );
    }

    #[tokio::test]
    async fn detects_plain_and_addressed_commands() {
        let api = FakeApi::new(|_, _| Ok(Value::Null));
        let bot = bot(&api).await;

        let plain = incoming("/start now", &[(0, 6)]);
        assert!(bot.detect_command("/start", &plain, false));
        assert!(!bot.detect_command("/start", &plain, true));
        assert!(!bot.detect_command("/stop", &plain, false));

        let addressed = incoming("/start@catbot", &[(0, 13)]);
        assert!(bot.detect_command("/start", &addressed, false));
        assert!(bot.detect_command("/start", &addressed, true));

        let other_bot = incoming("/start@dogbot", &[(0, 13)]);
        assert!(!bot.detect_command("/start", &other_bot, false));

        // A command that is not at the start of the text does not count.
        let trailing = incoming("hey /start", &[(4, 6)]);
        assert!(!bot.detect_command("/start", &trailing, false));

        let longer = incoming("/started", &[(0, 8)]);
        assert!(!bot.detect_command("/start", &longer, false));
    }

    #[test]
    fn split_respects_char_boundaries() {
        assert_eq!(split_text("abcde", 2), vec!["ab", "cd", "e"]);
        assert_eq!(split_text("日本語", 2), vec!["日本", "語"]);
        assert!(split_text("", 3).is_empty());
    }
}
