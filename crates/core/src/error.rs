//! Error types, one enum per bounded context.
//!
//! Errors are recovered locally at every external boundary (provider, tool,
//! channel); only startup failures are fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("TLS initialization failed: {0}")]
    TlsInit(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("stream interrupted: {0}")]
    Stream(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read session file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to write session file {path}: {reason}")]
    Write { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum CronError {
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidExpression { expr: String, reason: String },

    #[error("scheduler is full ({0} jobs)")]
    Full(usize),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },
}
