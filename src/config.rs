use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::logger::MessageLogMode;
use crate::protocol::DEFAULT_BASE_URL;
use crate::types::Credentials;

pub const DEFAULT_NAME: &str = "Salus Thermostat";

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(([A-Z_][A-Z0-9_]*)\)").expect("env pattern is a valid regex"));

#[derive(Debug, Clone, Deserialize)]
pub struct MessageLogConfig {
    pub mode: MessageLogMode,
    pub path: String,
}

/// One configured thermostat.
#[derive(Clone, Deserialize)]
pub struct Config {
    pub username: String,
    pub password: String,
    pub device_id: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_statistics_interval")]
    pub statistics_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub message_log: Option<MessageLogConfig>,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_statistics_interval() -> u64 {
    15
}

fn default_request_timeout() -> u64 {
    30
}

/// Values edited after initial setup; any field set here wins over the base config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverrides {
    pub username: Option<String>,
    pub password: Option<String>,
    pub device_id: Option<String>,
    pub name: Option<String>,
}

impl Config {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            device_id: device_id.into(),
            name: default_name(),
            base_url: default_base_url(),
            poll_interval_secs: default_poll_interval(),
            statistics_interval_secs: default_statistics_interval(),
            request_timeout_secs: default_request_timeout(),
            state_dir: None,
            message_log: None,
        }
    }

    /// Load from a YAML file, expanding `$(VAR)` references from the environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    pub fn merged(mut self, overrides: &ConfigOverrides) -> Result<Self> {
        if let Some(username) = &overrides.username {
            self.username = username.clone();
        }
        if let Some(password) = &overrides.password {
            self.password = password.clone();
        }
        if let Some(device_id) = &overrides.device_id {
            self.device_id = device_id.clone();
        }
        if let Some(name) = &overrides.name {
            self.name = name.clone();
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(Error::Config("username cannot be empty".to_string()));
        }
        if self.password.is_empty() {
            return Err(Error::Config("password cannot be empty".to_string()));
        }
        if self.device_id.trim().is_empty() {
            return Err(Error::Config("device_id cannot be empty".to_string()));
        }
        if self.poll_interval_secs == 0 || self.statistics_interval_secs == 0 {
            return Err(Error::Config("intervals must be at least one second".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs cannot be 0".to_string()));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password, &self.device_id)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn statistics_interval(&self) -> Duration {
        Duration::from_secs(self.statistics_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("device_id", &self.device_id)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("statistics_interval_secs", &self.statistics_interval_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("state_dir", &self.state_dir)
            .finish_non_exhaustive()
    }
}

fn expand_env_vars(content: &str) -> String {
    expand_with(content, |name| std::env::var(name).ok())
}

fn expand_with(content: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    ENV_VAR
        .replace_all(content, |caps: &regex::Captures| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
