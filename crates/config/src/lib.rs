//! Configuration loading for the CClaw runtime.
//!
//! The config file is a flat `key=value` dialect: `#` comment lines and
//! `[section]` lines are ignored, values may be double-quoted. Environment
//! variables override file values. Defaults match the runtime's shipped
//! behavior: Anthropic provider, gateway on port 3578, INFO logging.

use cclaw_core::ConfigError;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: String,
    /// `anthropic` or `openai`; selects the provider adapter.
    pub provider: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub telegram_enabled: bool,
    pub telegram_token: String,
    /// Comma list of ids/usernames; `*` or empty allows all.
    pub telegram_allowed: String,
    pub gateway_port: u16,
    pub gateway_token: String,
    pub memory_db: String,
    /// 0=trace 1=debug 2=info 3=warn 4=error 5=fatal.
    pub log_level: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: String::new(),
            provider: "anthropic".into(),
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".into(),
            temperature: 0.7,
            telegram_enabled: false,
            telegram_token: String::new(),
            telegram_allowed: String::new(),
            gateway_port: 3578,
            gateway_token: String::new(),
            memory_db: "memory.db".into(),
            log_level: 2,
        }
    }
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

impl Config {
    /// Load and apply a config file on top of the current values.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.apply_str(&content);
        Ok(())
    }

    /// Parse `key=value` lines. Unknown keys warn and are skipped.
    pub fn apply_str(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = unquote(value);

            match key {
                "workspace" => self.workspace = value.into(),
                "provider" => self.provider = value.into(),
                "api_key" => self.api_key = value.into(),
                "model" => self.model = value.into(),
                "temperature" => {
                    if let Ok(t) = value.parse() {
                        self.temperature = t;
                    }
                }
                "telegram_enabled" => self.telegram_enabled = value == "true" || value == "1",
                "telegram_token" => self.telegram_token = value.into(),
                "telegram_allowed" => self.telegram_allowed = value.into(),
                "gateway_port" => {
                    if let Ok(p) = value.parse() {
                        self.gateway_port = p;
                    }
                }
                "gateway_token" => self.gateway_token = value.into(),
                "memory_db" => self.memory_db = value.into(),
                "log_level" => {
                    if let Ok(l) = value.parse() {
                        self.log_level = l;
                    }
                }
                other => warn!("unknown config key: {other}"),
            }
        }
    }

    /// Apply environment overrides from the process environment.
    pub fn load_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    /// Environment override logic, parameterized over the lookup so it is
    /// testable without mutating process state.
    ///
    /// `CCLAW_API_KEY` wins outright; `ANTHROPIC_API_KEY` and
    /// `OPENAI_API_KEY` are fallbacks when no key is set. The latter also
    /// switches the provider to `openai`, which can surprise users holding
    /// both keys, hence the warning.
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("CCLAW_WORKSPACE") {
            self.workspace = v;
        }
        if let Some(v) = get("CCLAW_API_KEY") {
            self.api_key = v;
        }
        if self.api_key.is_empty() {
            if let Some(v) = get("ANTHROPIC_API_KEY") {
                self.api_key = v;
            }
        }
        if self.api_key.is_empty() {
            if let Some(v) = get("OPENAI_API_KEY") {
                self.api_key = v;
                self.provider = "openai".into();
                warn!("using OPENAI_API_KEY: provider switched to openai");
            }
        }
        if let Some(v) = get("CCLAW_MODEL") {
            self.model = v;
        }
        if let Some(v) = get("CCLAW_TELEGRAM_TOKEN") {
            self.telegram_token = v;
            self.telegram_enabled = true;
        }
        if let Some(v) = get("CCLAW_LOG_LEVEL") {
            if let Ok(l) = v.parse() {
                self.log_level = l;
            }
        }
    }

    /// The tracing level filter corresponding to the numeric log level.
    pub fn log_filter(&self) -> &'static str {
        match self.log_level {
            0 => "trace",
            1 => "debug",
            2 => "info",
            3 => "warn",
            _ => "error",
        }
    }

    /// Log the effective configuration with the credential masked.
    pub fn dump(&self) {
        info!("CClaw configuration:");
        info!("  workspace:  {}", if self.workspace.is_empty() { "(cwd)" } else { &self.workspace });
        info!("  provider:   {}", self.provider);
        info!("  model:      {}", self.model);
        info!("  api_key:    {}", if self.api_key.is_empty() { "(not set)" } else { "****" });
        info!("  telegram:   {}", if self.telegram_enabled { "enabled" } else { "disabled" });
        info!("  gateway:    port {}", self.gateway_port);
        info!("  memory_db:  {}", self.memory_db);
    }
}
