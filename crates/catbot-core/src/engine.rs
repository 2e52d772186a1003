//! Engine: one registry, one poller, one finalize hook.

use std::{future::Future, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::Config,
    dispatch::Dispatcher,
    domain::UpdateId,
    poller::{Poller, PollerConfig},
    ports::Transport,
    registry::TaskRegistry,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub poller: PollerConfig,
    /// Upper bound on handler bodies running at once. `None` is unbounded.
    pub max_concurrent_handlers: Option<usize>,
}

impl From<&Config> for EngineConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            poller: PollerConfig {
                poll_timeout: cfg.poll_timeout,
                request_grace: cfg.request_grace,
                initial_offset: cfg.initial_offset,
                log_updates: cfg.log_updates,
            },
            max_concurrent_handlers: cfg.max_concurrent_handlers,
        }
    }
}

/// Register tasks through [`Engine::tasks`], then hand the engine to [`Engine::run`].
///
/// `run` consumes the engine, so the registry cannot change once polling starts.
pub struct Engine {
    transport: Arc<dyn Transport>,
    config: EngineConfig,
    registry: TaskRegistry,
}

impl Engine {
    pub fn new(transport: Arc<dyn Transport>, config: EngineConfig) -> Self {
        Self {
            transport,
            config,
            registry: TaskRegistry::new(),
        }
    }

    pub fn tasks(&mut self) -> &mut TaskRegistry {
        &mut self.registry
    }

    /// Poll until `stop` is cancelled, then call `finalize`. Returns the final cursor.
    ///
    /// `finalize` runs exactly once: on a normal stop, while unwinding from a
    /// panic in the loop, or when the returned future is dropped before
    /// completion (including before it is first polled).
    pub fn run<F>(self, stop: CancellationToken, finalize: F) -> impl Future<Output = UpdateId>
    where
        F: FnOnce() + Send + 'static,
    {
        let finalizer = Finalizer(Some(Box::new(finalize)));

        async move {
            let _finalizer = finalizer;

            info!(tasks = self.registry.len(), "engine starting");
            let dispatcher = Dispatcher::new(
                Arc::new(self.registry),
                self.config.max_concurrent_handlers,
            );
            let mut poller = Poller::new(self.transport, dispatcher, self.config.poller);
            poller.run(&stop).await;

            let cursor = poller.cursor();
            info!(cursor, "engine stopped");
            cursor
        }
    }
}

struct Finalizer(Option<Box<dyn FnOnce() + Send>>);

impl Drop for Finalizer {
    fn drop(&mut self) {
        if let Some(finalize) = self.0.take() {
            finalize();
        }
    }
}
