use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{domain::UpdateId, errors::Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Typed bot configuration.
///
/// Comes either from a JSON file ([`Config::from_file`], written back by
/// [`Config::save`]) or from `CATBOT_*` environment variables ([`Config::load`]).
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub token: String,
    pub api_base: String,
    pub proxy_url: Option<String>,

    // Polling
    pub poll_timeout: Duration,
    pub request_grace: Duration,
    pub initial_offset: UpdateId,
    pub log_updates: bool,

    // Handlers
    pub max_concurrent_handlers: Option<usize>,
    pub record_path: Option<PathBuf>,

    /// Keys this crate does not interpret; kept so `save` does not lose them.
    pub extra: Map<String, Value>,

    /// Whether a configured proxy is switched on. Only the file form can turn it off.
    proxy_enabled: bool,
    source: Option<PathBuf>,
}

/// On-disk shape of the config file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileConfig {
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    record: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proxy: Option<ProxySection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    poll_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    initial_offset: Option<UpdateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_concurrent_handlers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log_updates: Option<bool>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProxySection {
    #[serde(default)]
    enable: bool,
    #[serde(default)]
    proxy_url: String,
}

impl Config {
    /// Defaults for everything but the token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            proxy_url: None,
            poll_timeout: Duration::from_secs(60),
            request_grace: Duration::from_secs(10),
            initial_offset: 0,
            log_updates: false,
            max_concurrent_handlers: None,
            record_path: None,
            extra: Map::new(),
            proxy_enabled: true,
            source: None,
        }
    }

    /// Load from environment variables, honouring a `.env` file in the working
    /// directory (existing variables win).
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let token = env_str("CATBOT_TOKEN").and_then(non_empty).ok_or_else(|| {
            Error::Config("CATBOT_TOKEN environment variable is required".to_string())
        })?;

        let mut cfg = Self::new(token);
        if let Some(base) = env_str("CATBOT_API_BASE").and_then(non_empty) {
            cfg.api_base = base;
        }
        cfg.proxy_url = env_str("CATBOT_PROXY_URL").and_then(non_empty);
        if let Some(secs) = env_u64("CATBOT_POLL_TIMEOUT") {
            cfg.poll_timeout = Duration::from_secs(secs);
        }
        if let Some(offset) = env_i64("CATBOT_INITIAL_OFFSET") {
            cfg.initial_offset = offset;
        }
        cfg.record_path = env_path("CATBOT_RECORD_PATH");
        cfg.max_concurrent_handlers = env_usize("CATBOT_MAX_HANDLERS").filter(|n| *n > 0);
        cfg.log_updates = env_bool("CATBOT_LOG_UPDATES").unwrap_or(false);

        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a JSON config file. [`Config::save`] writes back to the same path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let file: FileConfig = serde_json::from_str(&contents)?;

        let mut cfg = Self::new(file.token);
        if let Some(base) = file.api_base.and_then(non_empty) {
            cfg.api_base = base;
        }
        if let Some(proxy) = file.proxy {
            cfg.proxy_enabled = proxy.enable;
            cfg.proxy_url = non_empty(proxy.proxy_url);
        }
        if let Some(secs) = file.poll_timeout {
            cfg.poll_timeout = Duration::from_secs(secs);
        }
        if let Some(offset) = file.initial_offset {
            cfg.initial_offset = offset;
        }
        cfg.max_concurrent_handlers = file.max_concurrent_handlers.filter(|n| *n > 0);
        cfg.log_updates = file.log_updates.unwrap_or(false);
        cfg.record_path = file.record;
        cfg.extra = file.extra;
        cfg.source = Some(path.to_path_buf());

        cfg.validate()?;
        Ok(cfg)
    }

    /// Write the config back to the file it came from. No-op for env-loaded configs.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.source else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.to_file())?;
        fs::write(path, json)?;
        Ok(())
    }

    /// File this config was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Proxy to route requests through, if one is configured and enabled.
    pub fn proxy(&self) -> Option<&str> {
        if self.proxy_enabled {
            self.proxy_url.as_deref()
        } else {
            None
        }
    }

    fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(Error::Config("bot token is required".to_string()));
        }
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(Error::Config(format!(
                "api base must be an http(s) URL, got {:?}",
                self.api_base
            )));
        }
        Ok(())
    }

    fn to_file(&self) -> FileConfig {
        let defaults = Self::new(String::new());
        FileConfig {
            token: self.token.clone(),
            record: self.record_path.clone(),
            proxy: self.proxy_url.as_ref().map(|url| ProxySection {
                enable: self.proxy_enabled,
                proxy_url: url.clone(),
            }),
            api_base: (self.api_base != defaults.api_base).then(|| self.api_base.clone()),
            poll_timeout: (self.poll_timeout != defaults.poll_timeout)
                .then(|| self.poll_timeout.as_secs()),
            initial_offset: (self.initial_offset != 0).then_some(self.initial_offset),
            max_concurrent_handlers: self.max_concurrent_handlers,
            log_updates: self.log_updates.then_some(true),
            extra: self.extra.clone(),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_i64(key: &str) -> Option<i64> {
    env_str(key).and_then(|s| s.trim().parse::<i64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
