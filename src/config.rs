//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (session token) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub console: ConsoleConfig,
    pub settlement: SettlementConfig,
    pub statement: StatementConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConsoleConfig {
    /// Operator display name, used in audit records and logs.
    pub operator: String,
    /// Whether a secondary declare password is configured for this operator.
    /// Fetched once per session and treated as read-only thereafter.
    pub secret_declare_configured: bool,
    /// Env var holding the secret declare password for non-interactive runs.
    #[serde(default)]
    pub secret_password_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SettlementConfig {
    pub base_url: String,
    /// Env var holding the operator session token.
    pub session_token_env: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatementConfig {
    /// Account-local UTC offset in minutes, used for calendar day boundaries.
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuditConfig {
    #[serde(default)]
    pub path: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
