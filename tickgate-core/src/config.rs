//! Bridge configuration.
//!
//! Defaults, then an optional JSON file, then `TICKGATE_*` environment
//! overrides. The binary layers its command-line flags on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_REQUEST_PIPE: &str = "/tmp/tickgate_request";
pub const DEFAULT_RESPONSE_PIPE: &str = "/tmp/tickgate_response";

pub const ENV_REQUEST_PIPE: &str = "TICKGATE_REQUEST_PIPE";
pub const ENV_RESPONSE_PIPE: &str = "TICKGATE_RESPONSE_PIPE";
pub const ENV_TIMEOUT_MS: &str = "TICKGATE_TIMEOUT_MS";
pub const ENV_MAX_RETRIES: &str = "TICKGATE_MAX_RETRIES";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Bridge configuration.
///
/// Fields missing from a config file keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Outbound channel: the controller writes requests here.
    pub request_pipe: PathBuf,
    /// Inbound channel: the controller reads replies here.
    pub response_pipe: PathBuf,
    /// Bound on the wait for a single reply.
    pub response_timeout_ms: u64,
    /// Escalate after this many consecutive execution failures (`None` = never).
    pub max_retries: Option<u32>,
    /// Apply single structural actions without asking the agent.
    pub auto_skip: bool,
    /// Initial state of the loop's enable switch.
    pub start_enabled: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_pipe: PathBuf::from(DEFAULT_REQUEST_PIPE),
            response_pipe: PathBuf::from(DEFAULT_RESPONSE_PIPE),
            response_timeout_ms: 5000,
            max_retries: None,
            auto_skip: true,
            start_enabled: true,
        }
    }
}

impl BridgeConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then the optional file, then `TICKGATE_*` environment variables.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in practice).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_REQUEST_PIPE) {
            self.request_pipe = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_RESPONSE_PIPE) {
            self.response_pipe = PathBuf::from(path);
        }
        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            self.response_timeout_ms = parse_env(ENV_TIMEOUT_MS, value)?;
        }
        if let Some(value) = lookup(ENV_MAX_RETRIES) {
            self.max_retries = Some(parse_env(ENV_MAX_RETRIES, value)?);
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}
