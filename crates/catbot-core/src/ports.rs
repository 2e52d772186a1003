use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{errors::Error, Result};

/// One request/response exchange against the bot API.
///
/// Implementations return the envelope's `result` on success, `Error::Api` when
/// the server answered with `ok: false`, and `Error::Transport` when no usable
/// answer arrived at all. HTTP lives in `catbot-telegram`; tests use in-memory fakes.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, method: &str, payload: Value, timeout: Duration) -> Result<Value>;

    /// Fetch the raw bytes of a server-side file path returned by `getFile`.
    async fn download(&self, file_path: &str) -> Result<Vec<u8>> {
        Err(Error::External(format!(
            "this transport cannot download files ({file_path})"
        )))
    }
}
