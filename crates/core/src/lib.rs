//! # CClaw Core
//!
//! Domain types, errors, and the shutdown token for the CClaw agent runtime.
//! This crate has no transport or storage dependencies; it defines the
//! message model and response shapes that every other crate builds on.

pub mod error;
pub mod message;
pub mod response;
pub mod shutdown;

pub use error::{ConfigError, CronError, HttpError, MemoryError, SessionError};
pub use message::{Content, ContentBlock, Message, Role};
pub use response::{ChatResponse, StopReason, ToolCallRequest};
pub use shutdown::Shutdown;
