//! Core runtime for a long-polling Telegram bot.
//!
//! This crate is transport-agnostic: it classifies raw updates, renders message
//! entities, and fans events out to registered tasks. The HTTP transport and the
//! typed Bot API client live in `catbot-telegram`.

pub mod api_error;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod model;
pub mod poller;
pub mod ports;
pub mod record;
pub mod registry;
pub mod update;

pub use errors::{Error, Result};
