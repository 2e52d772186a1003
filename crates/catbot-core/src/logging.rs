use crate::{errors::Error, Result};

/// Install the global tracing subscriber.
///
/// Defaults to info for the catbot crates and `service_name`; `RUST_LOG`
/// overrides the filter. Fails if a subscriber is already installed.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "info,catbot=info,catbot_core=info,catbot_telegram=info,{service_name}=info"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::External(format!("logging init failed: {e}")))
}
