//! Task registry: what to run for each kind of event.

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use crate::model::{CallbackQuery, ChatJoinRequest, ChatMemberUpdate, Message};

pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
type Handler<E> = Arc<dyn Fn(E, StaticArgs) -> HandlerFuture + Send + Sync>;

/// Named arguments fixed at registration time and handed to every invocation.
///
/// Insertion-ordered; setting an existing name replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StaticArgs(Arc<Vec<(String, Value)>>);

impl StaticArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        let args = Arc::make_mut(&mut self.0);
        match args.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => args.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One registration: run `handler` with `args` whenever `predicate` accepts an event.
pub struct TaskEntry<E> {
    predicate: Predicate<E>,
    handler: Handler<E>,
    args: StaticArgs,
}

impl<E: 'static> TaskEntry<E> {
    pub fn new<P, H, Fut>(predicate: P, handler: H, args: StaticArgs) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
        H: Fn(E, StaticArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            handler: Arc::new(move |event: E, args: StaticArgs| -> HandlerFuture {
                Box::pin(handler(event, args))
            }),
            args,
        }
    }

    pub fn matches(&self, event: &E) -> bool {
        (self.predicate)(event)
    }

    /// Build the future for one invocation. Nothing runs until it is polled.
    pub fn invoke(&self, event: E) -> HandlerFuture {
        (self.handler)(event, self.args.clone())
    }
}

/// Append-only task lists, one per event type, evaluated in insertion order.
///
/// Registration happens during setup; once the engine starts the registry is
/// frozen behind an `Arc`.
#[derive(Default)]
pub struct TaskRegistry {
    pub(crate) messages: Vec<TaskEntry<Message>>,
    pub(crate) callback_queries: Vec<TaskEntry<CallbackQuery>>,
    pub(crate) member_updates: Vec<TaskEntry<ChatMemberUpdate>>,
    pub(crate) my_member_updates: Vec<TaskEntry<ChatMemberUpdate>>,
    pub(crate) join_requests: Vec<TaskEntry<ChatJoinRequest>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_message<P, H, Fut>(&mut self, predicate: P, handler: H, args: StaticArgs) -> &mut Self
    where
        P: Fn(&Message) -> bool + Send + Sync + 'static,
        H: Fn(Message, StaticArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.messages.push(TaskEntry::new(predicate, handler, args));
        self
    }

    pub fn on_callback_query<P, H, Fut>(
        &mut self,
        predicate: P,
        handler: H,
        args: StaticArgs,
    ) -> &mut Self
    where
        P: Fn(&CallbackQuery) -> bool + Send + Sync + 'static,
        H: Fn(CallbackQuery, StaticArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.callback_queries.push(TaskEntry::new(predicate, handler, args));
        self
    }

    /// Status changes of other members (`chat_member` updates).
    pub fn on_member_status<P, H, Fut>(
        &mut self,
        predicate: P,
        handler: H,
        args: StaticArgs,
    ) -> &mut Self
    where
        P: Fn(&ChatMemberUpdate) -> bool + Send + Sync + 'static,
        H: Fn(ChatMemberUpdate, StaticArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.member_updates.push(TaskEntry::new(predicate, handler, args));
        self
    }

    /// Status changes of the bot itself (`my_chat_member` updates).
    pub fn on_my_member_status<P, H, Fut>(
        &mut self,
        predicate: P,
        handler: H,
        args: StaticArgs,
    ) -> &mut Self
    where
        P: Fn(&ChatMemberUpdate) -> bool + Send + Sync + 'static,
        H: Fn(ChatMemberUpdate, StaticArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.my_member_updates.push(TaskEntry::new(predicate, handler, args));
        self
    }

    pub fn on_chat_join_request<P, H, Fut>(
        &mut self,
        predicate: P,
        handler: H,
        args: StaticArgs,
    ) -> &mut Self
    where
        P: Fn(&ChatJoinRequest) -> bool + Send + Sync + 'static,
        H: Fn(ChatJoinRequest, StaticArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.join_requests.push(TaskEntry::new(predicate, handler, args));
        self
    }

    pub fn len(&self) -> usize {
        self.messages.len()
            + self.callback_queries.len()
            + self.member_updates.len()
            + self.my_member_updates.len()
            + self.join_requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
