use std::path::PathBuf;

use crate::api_error::DomainError;

/// Core error type.
///
/// Transport adapters map their failures into this type; state-changing API calls
/// refine `Api` into `Domain` through [`DomainError::classify`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("API request \"{method}\" failed. {description}")]
    Api { method: String, description: String },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Refine a raw API failure into its typed [`DomainError`]. Other variants pass through.
    pub fn classify(self) -> Self {
        match self {
            Error::Api { description, .. } => Error::Domain(DomainError::classify(&description)),
            other => other,
        }
    }

    /// Server-provided description, if this is an API failure.
    pub fn api_description(&self) -> Option<&str> {
        match self {
            Error::Api { description, .. } => Some(description),
            Error::Domain(d) => Some(d.description()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
