//! Configuration loading and management
//!
//! ```yaml
//! server:
//!   bind: 0.0.0.0:4000
//! realtime:
//!   sweep_interval_secs: 30
//!   heartbeat_timeout_secs: 30
//!   outbound_buffer: 64
//!   scoped_broadcast: false
//! auth:
//!   jwt_secret: change-me
//!   token_ttl_secs: 604800
//! push:
//!   provider: log
//! ```
//!
//! `JWT_SECRET`, `COURIER_BIND` and `COURIER_OPERATOR_KEY` override the file.

use crate::core::error::ConfigError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0:4000";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourierConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub push: PushConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Liveness sweep period
    #[serde(default = "default_thirty")]
    pub sweep_interval_secs: u64,

    /// Silence after which a connection is evicted
    #[serde(default = "default_thirty")]
    pub heartbeat_timeout_secs: u64,

    /// Per-connection outbound queue capacity
    #[serde(default = "default_buffer")]
    pub outbound_buffer: usize,

    /// Narrow role broadcasts to the event's restaurant or zone
    #[serde(default)]
    pub scoped_broadcast: bool,
}

impl RealtimeConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_thirty(),
            heartbeat_timeout_secs: default_thirty(),
            outbound_buffer: default_buffer(),
            scoped_broadcast: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Shared key that lets the CRUD layer act as operator over REST.
    /// Operator routes are disabled when unset.
    #[serde(default)]
    pub operator_key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: default_token_ttl(),
            operator_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushProviderKind {
    #[default]
    Log,
    Expo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default)]
    pub provider: PushProviderKind,
    /// Overrides the provider's default endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_thirty() -> u64 {
    30
}

fn default_buffer() -> usize {
    64
}

fn default_token_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}

impl CourierConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            message: format!("{}: {}", path, e),
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            file: Some(path.to_string()),
            message: e.to_string(),
        })?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Development defaults with a fixed secret
    pub fn default_config() -> Self {
        let mut config = Self::default();
        config.auth.jwt_secret = "dev-secret-change-me".to_string();
        config
    }

    /// Apply `JWT_SECRET`, `COURIER_BIND` and `COURIER_OPERATOR_KEY`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an
    /// injectable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            self.auth.jwt_secret = secret;
        }
        if let Some(bind) = lookup("COURIER_BIND").filter(|s| !s.is_empty()) {
            self.server.bind = bind;
        }
        if let Some(key) = lookup("COURIER_OPERATOR_KEY").filter(|s| !s.is_empty()) {
            self.auth.operator_key = Some(key);
        }
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "auth.jwt_secret".to_string(),
                value: String::new(),
                message: "a signing secret is required (or set JWT_SECRET)".to_string(),
            });
        }
        for (field, value) in [
            ("realtime.sweep_interval_secs", self.realtime.sweep_interval_secs),
            ("realtime.heartbeat_timeout_secs", self.realtime.heartbeat_timeout_secs),
            ("realtime.outbound_buffer", self.realtime.outbound_buffer as u64),
            ("auth.token_ttl_secs", self.auth.token_ttl_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "server.bind".to_string(),
                value: self.server.bind.clone(),
                message: "expected host:port".to_string(),
            });
        }
        Ok(())
    }
}
