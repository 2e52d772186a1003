//! Telegram adapter: the HTTP [`Transport`](catbot_core::ports::Transport)
//! and a typed Bot API client on top of it.

pub mod bot;
pub mod transport;

pub use bot::{AnswerOptions, Bot, ParseMode, SendOptions};
pub use transport::HttpTransport;
