//! Channel drivers.
//!
//! Every channel fans into the agent loop with a channel-prefixed session
//! key: `cli` for the terminal, `tg_<chat>` for Telegram chats (the
//! WebSocket gateway keys `ws_<conn>` from its own crate).

pub mod cli;
pub mod telegram;

pub use cli::{interactive, one_shot};
pub use telegram::{TelegramChannel, TelegramConfig};
