//! The long-polling control loop.

use std::{sync::Arc, time::Duration};

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    dispatch::Dispatcher,
    domain::UpdateId,
    errors::Error,
    ports::Transport,
    update::{self, RawUpdate, ALLOWED_UPDATES},
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollerConfig {
    /// How long the server may hold a fetch open.
    pub poll_timeout: Duration,
    /// Added to `poll_timeout` to bound each fetch on our side.
    pub request_grace: Duration,
    /// Cursor to start from when the server has no backlog.
    pub initial_offset: UpdateId,
    /// Log every raw update at info instead of debug.
    pub log_updates: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(60),
            request_grace: Duration::from_secs(10),
            initial_offset: 0,
            log_updates: false,
        }
    }
}

/// Owns the update cursor and drives fetch → classify → dispatch.
pub struct Poller {
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    config: PollerConfig,
    cursor: UpdateId,
}

impl Poller {
    pub fn new(
        transport: Arc<dyn Transport>,
        dispatcher: Dispatcher,
        config: PollerConfig,
    ) -> Self {
        let cursor = config.initial_offset;
        Self {
            transport,
            dispatcher,
            config,
            cursor,
        }
    }

    /// Next update id that will be requested.
    pub fn cursor(&self) -> UpdateId {
        self.cursor
    }

    /// Poll until `stop` is cancelled.
    ///
    /// Updates queued before the call are skipped. `stop` is only looked at between
    /// fetches, so an in-flight long-poll finishes (or times out) first. Fetch
    /// failures are logged and retried at once with the same cursor.
    pub async fn run(&mut self, stop: &CancellationToken) {
        self.skip_backlog(stop).await;

        while !stop.is_cancelled() {
            match self.fetch(self.cursor, self.config.poll_timeout).await {
                Ok(updates) => self.process(updates),
                Err(e) => {
                    warn!(cursor = self.cursor, "fetching updates failed: {e}");
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    async fn skip_backlog(&mut self, stop: &CancellationToken) {
        while !stop.is_cancelled() {
            match self.fetch(self.cursor, Duration::ZERO).await {
                Ok(backlog) => {
                    if let Some(last) = backlog.iter().filter_map(update::update_id).max() {
                        self.cursor = self.cursor.max(last + 1);
                    }
                    info!(
                        skipped = backlog.len(),
                        cursor = self.cursor,
                        "polling started"
                    );
                    return;
                }
                Err(e) => {
                    warn!("fetching backlog failed: {e}");
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    async fn fetch(&self, offset: UpdateId, timeout: Duration) -> Result<Vec<RawUpdate>> {
        let payload = json!({
            "offset": offset,
            "timeout": timeout.as_secs(),
            "allowed_updates": ALLOWED_UPDATES,
        });
        let result = self
            .transport
            .call("getUpdates", payload, timeout + self.config.request_grace)
            .await?;

        match result {
            Value::Array(updates) => Ok(updates),
            other => Err(Error::Decode(format!(
                "getUpdates returned a non-array result: {other}"
            ))),
        }
    }

    fn process(&mut self, updates: Vec<RawUpdate>) {
        for raw in updates {
            let Some(id) = update::update_id(&raw) else {
                warn!("update without update_id; skipping");
                continue;
            };
            // Advance first: a record that later fails to decode is still consumed.
            self.cursor = self.cursor.max(id + 1);

            if self.config.log_updates {
                info!(update_id = id, "update: {raw}");
            } else {
                debug!(update_id = id, "update received");
            }

            if let Some(event) = update::classify(raw) {
                self.dispatcher.dispatch(event);
            }
        }
    }
}
