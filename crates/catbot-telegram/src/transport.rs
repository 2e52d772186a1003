use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use catbot_core::{
    api_error::DomainError, config::Config, errors::Error, ports::Transport, Result,
};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Bot API over HTTPS.
///
/// Every call is a JSON `POST <api_base>/bot<token>/<method>`. Errors never
/// include the request URL, since it embeds the token.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

#[derive(Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    description: Option<String>,
}

impl HttpTransport {
    pub fn new(token: impl Into<String>, api_base: &str, proxy: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(url) = proxy {
            let proxy = reqwest::Proxy::all(url)
                .map_err(|e| Error::Config(format!("invalid proxy url {url:?}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(cfg.token.clone(), &cfg.api_base, cfg.proxy())
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, method: &str, payload: Value, timeout: Duration) -> Result<Value> {
        trace!(method, "api call");
        let resp = self
            .http
            .post(self.method_url(method))
            .json(&payload)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{method}: {}", e.without_url())))?;

        // Error replies still carry the JSON envelope, so the status alone says little.
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("{method}: {}", e.without_url())))?;
        let envelope: Envelope = serde_json::from_slice(&body).map_err(|e| {
            Error::Transport(format!("{method}: unreadable response ({status}): {e}"))
        })?;

        parse_envelope(method, envelope)
    }

    async fn download(&self, file_path: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(self.file_url(file_path))
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("download: {}", e.without_url())))?;

        if resp.status() != reqwest::StatusCode::OK {
            return Err(DomainError::FilePath(format!(
                "File path {file_path} error or expired ({})",
                resp.status()
            ))
            .into());
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("download: {}", e.without_url())))?;
        Ok(bytes.to_vec())
    }
}

fn parse_envelope(method: &str, envelope: Envelope) -> Result<Value> {
    if envelope.ok {
        return Ok(envelope.result);
    }
    Err(Error::Api {
        method: method.to_string(),
        description: envelope
            .description
            .unwrap_or_else(|| "no description".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(v: Value) -> Envelope {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn ok_envelope_yields_result() {
        let res = parse_envelope("getMe", envelope(json!({"ok": true, "result": {"id": 1}})));
        assert_eq!(res.unwrap(), json!({"id": 1}));
    }

    #[test]
    fn failed_envelope_becomes_api_error() {
        let res = parse_envelope(
            "deleteMessage",
            envelope(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message can't be deleted"
            })),
        );
        match res {
            Err(Error::Api {
                method,
                description,
            }) => {
                assert_eq!(method, "deleteMessage");
                assert_eq!(description, "Bad Request: message can't be deleted");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn urls_embed_token_and_trim_base() {
        let t = HttpTransport::new("123:abc", "https://api.example.org/", None).unwrap();
        assert_eq!(
            t.method_url("getUpdates"),
            "https://api.example.org/bot123:abc/getUpdates"
        );
        assert_eq!(
            t.file_url("photos/file_1.jpg"),
            "https://api.example.org/file/bot123:abc/photos/file_1.jpg"
        );
    }
}
