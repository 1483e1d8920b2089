//! Client configuration
//!
//! Endpoint and heart-beat settings come from a YAML file; credentials only
//! ever come from the environment (or `.env`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use stompsockets::{StaticCredentials, StompClient};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// STOMP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StompConfig {
    /// Broker endpoint (SockJS base URL or plain WebSocket URL)
    #[serde(default = "default_url")]
    pub url: String,
    /// Dial the SockJS raw WebSocket endpoint (`<url>/websocket`)
    #[serde(default = "default_sockjs")]
    pub sockjs: bool,
    /// STOMP virtual host; defaults to the URL host
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub heartbeat: HeartbeatSettings,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Broker login from .env (not in YAML)
    #[serde(skip)]
    pub login: Option<String>,

    /// Broker passcode from .env (not in YAML)
    #[serde(skip)]
    pub passcode: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeartbeatSettings {
    #[serde(default = "default_heartbeat_ms")]
    pub outgoing_ms: u64,
    #[serde(default = "default_heartbeat_ms")]
    pub incoming_ms: u64,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            outgoing_ms: default_heartbeat_ms(),
            incoming_ms: default_heartbeat_ms(),
        }
    }
}

fn default_url() -> String {
    "http://localhost:9000/websocket".to_string()
}

fn default_sockjs() -> bool {
    true
}

fn default_heartbeat_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StompConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            sockjs: default_sockjs(),
            host: None,
            heartbeat: HeartbeatSettings::default(),
            log_level: default_log_level(),
            login: None,
            passcode: None,
        }
    }
}

impl StompConfig {
    /// Load configuration from YAML file and .env
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config = Self::from_yaml(&yaml_content)?;

        // Load .env file
        dotenv::dotenv().ok(); // Don't fail if .env doesn't exist
        config.apply_overrides(|key| std::env::var(key).ok());

        config.validate()?;
        Ok(config)
    }

    /// Parse YAML without touching the environment
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply `STOMP_URL`, `STOMP_LOGIN` and `STOMP_PASSCODE`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("STOMP_URL") {
            info!("Overriding broker URL from environment variable");
            self.url = url;
        }
        if let Some(login) = lookup("STOMP_LOGIN") {
            self.login = Some(login);
        }
        if let Some(passcode) = lookup("STOMP_PASSCODE") {
            self.passcode = Some(passcode);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::ValidationError("url cannot be empty".to_string()));
        }

        let scheme = self
            .url
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| ConfigError::ValidationError("url must include a scheme".to_string()))?;
        if !["http", "https", "ws", "wss"].contains(&scheme.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "url scheme must be one of http, https, ws, wss (got '{}')",
                scheme
            )));
        }

        if self.login.is_some() != self.passcode.is_some() {
            return Err(ConfigError::ValidationError(
                "STOMP_LOGIN and STOMP_PASSCODE must be set together".to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Broker URL: {}", self.url);
        info!("  SockJS raw endpoint: {}", self.sockjs);
        info!("  Host: {}", self.host.as_deref().unwrap_or("(from URL)"));
        info!(
            "  Heart-beat: out {} ms / in {} ms",
            self.heartbeat.outgoing_ms, self.heartbeat.incoming_ms
        );
        info!("  Credentials: {}", if self.login.is_some() { "set" } else { "none" });
        info!("  Log level: {}", self.log_level);
    }

    /// Build a (not yet connected) client from this configuration
    pub async fn build_client(&self) -> stompsockets::Result<StompClient> {
        let mut builder = stompsockets::builder()
            .url(self.url.as_str())
            .sockjs(self.sockjs)
            .heartbeat(
                Duration::from_millis(self.heartbeat.outgoing_ms),
                Duration::from_millis(self.heartbeat.incoming_ms),
            );

        if let Some(host) = &self.host {
            builder = builder.host(host.as_str());
        }
        if let (Some(login), Some(passcode)) = (&self.login, &self.passcode) {
            builder = builder.headers(StaticCredentials::new(login.as_str(), passcode.as_str()));
        }

        builder.build().await
    }
}
