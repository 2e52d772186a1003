//! Fan-out of classified events to registered tasks.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::trace;

use crate::{
    registry::{HandlerFuture, TaskEntry, TaskRegistry},
    update::Event,
};

/// Starts one detached tokio task per matching registration.
///
/// Handlers are never joined and their outcome (including panics) is not
/// observed. With `max_concurrent` set, spawned tasks wait for a permit before
/// running their handler; the caller is never blocked either way.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<TaskRegistry>,
    permits: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<TaskRegistry>, max_concurrent: Option<usize>) -> Self {
        Self {
            registry,
            permits: max_concurrent.map(|n| Arc::new(Semaphore::new(n.max(1)))),
        }
    }

    /// Evaluate predicates for `event`'s type in registration order and spawn a
    /// handler for each match. Returns the number of handlers started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, event: Event) -> usize {
        let kind = event.kind();
        let started = match event {
            Event::Message(m) => self.fan_out(&self.registry.messages, m),
            Event::CallbackQuery(q) => self.fan_out(&self.registry.callback_queries, q),
            Event::ChatMember {
                update,
                for_self: false,
            } => self.fan_out(&self.registry.member_updates, update),
            Event::ChatMember {
                update,
                for_self: true,
            } => self.fan_out(&self.registry.my_member_updates, update),
            Event::ChatJoinRequest(r) => self.fan_out(&self.registry.join_requests, r),
        };
        trace!(?kind, started, "dispatched event");
        started
    }

    fn fan_out<E: Clone + 'static>(&self, entries: &[TaskEntry<E>], event: E) -> usize {
        let mut started = 0usize;
        for entry in entries {
            if entry.matches(&event) {
                self.spawn(entry.invoke(event.clone()));
                started += 1;
            }
        }
        started
    }

    fn spawn(&self, fut: HandlerFuture) {
        match &self.permits {
            None => {
                tokio::spawn(fut);
            }
            Some(permits) => {
                let permits = Arc::clone(permits);
                tokio::spawn(async move {
                    // The semaphore is never closed, so acquisition only fails on shutdown.
                    let Ok(_permit) = permits.acquire_owned().await else {
                        return;
                    };
                    fut.await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{ChatJoinRequest, Message},
        registry::StaticArgs,
    };
    use serde_json::json;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use tokio::sync::mpsc;

    fn message(text: &str) -> Message {
        serde_json::from_value(json!({
            "message_id": 1,
            "date": 0,
            "chat": {"id": 10, "type": "private", "first_name": "A"},
            "text": text
        }))
        .unwrap()
    }

    async fn recv_n<T>(rx: &mut mpsc::UnboundedReceiver<T>, n: usize) -> Vec<T> {
        let mut out = Vec::new();
        for _ in 0..n {
            let item = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("handler did not run")
                .expect("channel closed");
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn fans_out_to_every_matching_registration() {
        let (tx, mut rx) = mpsc::unbounded_channel::<(&'static str, Message)>();
        let mut reg = TaskRegistry::new();
        for (name, accept) in [("first", true), ("second", false), ("third", true)] {
            let tx = tx.clone();
            reg.on_message(
                move |_| accept,
                move |m, _| {
                    let tx = tx.clone();
                    async move {
                        let _ = tx.send((name, m));
                    }
                },
                StaticArgs::new(),
            );
        }
        drop(tx);

        let dispatcher = Dispatcher::new(Arc::new(reg), None);
        let event = message("hello");
        assert_eq!(dispatcher.dispatch(Event::Message(event.clone())), 2);

        let mut got = recv_n(&mut rx, 2).await;
        got.sort_by_key(|(name, _)| *name);
        assert_eq!(got[0].0, "first");
        assert_eq!(got[1].0, "third");
        assert!(got.iter().all(|(_, m)| *m == event));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn handlers_receive_static_args() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut reg = TaskRegistry::new();
        reg.on_message(
            |m| m.text.starts_with("/greet"),
            move |m, args| {
                let tx = tx.clone();
                async move {
                    let greeting = args.get_str("greeting").unwrap_or("?").to_string();
                    let _ = tx.send(format!("{greeting}, {}", m.chat.name()));
                }
            },
            StaticArgs::new().with("greeting", "hi"),
        );

        let dispatcher = Dispatcher::new(Arc::new(reg), None);
        assert_eq!(dispatcher.dispatch(Event::Message(message("nope"))), 0);
        assert_eq!(dispatcher.dispatch(Event::Message(message("/greet"))), 1);
        assert_eq!(recv_n(&mut rx, 1).await, vec!["hi, A".to_string()]);
    }

    #[tokio::test]
    async fn routes_by_event_type() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut reg = TaskRegistry::new();
        let h = Arc::clone(&hits);
        reg.on_chat_join_request(
            |_| true,
            move |_, _| {
                let h = Arc::clone(&h);
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                }
            },
            StaticArgs::new(),
        );

        let dispatcher = Dispatcher::new(Arc::new(reg), None);
        assert_eq!(dispatcher.dispatch(Event::Message(message("x"))), 0);

        let request: ChatJoinRequest = serde_json::from_value(json!({
            "chat": {"id": -1001, "type": "supergroup", "title": "G"},
            "from": {"id": 3, "is_bot": false, "first_name": "M"},
            "user_chat_id": 3,
            "date": 1
        }))
        .unwrap();
        assert_eq!(dispatcher.dispatch(Event::ChatJoinRequest(request)), 1);
    }

    #[tokio::test]
    async fn panicking_handler_does_not_affect_siblings() {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let mut reg = TaskRegistry::new();
        reg.on_message(
            |_| true,
            |_, _| async { panic!("handler failure") },
            StaticArgs::new(),
        );
        reg.on_message(
            |_| true,
            move |_, _| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(());
                }
            },
            StaticArgs::new(),
        );

        let dispatcher = Dispatcher::new(Arc::new(reg), None);
        assert_eq!(dispatcher.dispatch(Event::Message(message("x"))), 2);
        recv_n(&mut rx, 1).await;
        // The dispatcher is still usable afterwards.
        assert_eq!(dispatcher.dispatch(Event::Message(message("y"))), 2);
        recv_n(&mut rx, 1).await;
    }

    #[tokio::test]
    async fn concurrency_cap_limits_running_handlers() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let mut reg = TaskRegistry::new();
        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        reg.on_message(
            |_| true,
            move |_, _| {
                let (r, p, tx) = (Arc::clone(&r), Arc::clone(&p), tx.clone());
                async move {
                    let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    r.fetch_sub(1, Ordering::SeqCst);
                    let _ = tx.send(());
                }
            },
            StaticArgs::new(),
        );

        let dispatcher = Dispatcher::new(Arc::new(reg), Some(2));
        for _ in 0..6 {
            assert_eq!(dispatcher.dispatch(Event::Message(message("x"))), 1);
        }
        recv_n(&mut rx, 6).await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
