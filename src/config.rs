//! Layered configuration.
//!
//! Values are resolved in this order, later layers winning:
//! 1. built-in defaults
//! 2. `.taskboard/taskboard.toml`
//! 3. environment (`TASKBOARD_*`, with `.env` loaded first)
//! 4. CLI flags, applied by the binary

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::board::server::ServerConfig;
use crate::errors::ConfigError;

pub const CONFIG_DIR: &str = ".taskboard";
pub const CONFIG_FILE: &str = "taskboard.toml";

/// Path of the config file inside `project_dir`.
pub fn config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_DIR).join(CONFIG_FILE)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::UnknownLogFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Base URL used in notification links.
    #[serde(default = "default_app_url")]
    pub app_url: String,
    /// Permissive CORS for a local front-end dev server.
    #[serde(default)]
    pub dev: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3141
}

fn default_db_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("board.db")
}

fn default_app_url() -> String {
    "http://localhost:3141".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            app_url: default_app_url(),
            dev: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationsSection {
    /// Webhook receiving assignment notifications. Unset means log only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Directory for daily rolling log files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            file_dir: None,
        }
    }
}

/// The complete taskboard.toml structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskboardConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub notifications: NotificationsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl TaskboardConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse taskboard.toml")
    }

    /// Load `taskboard.toml` from `project_dir`, or defaults if it is absent.
    pub fn load_or_default(project_dir: &Path) -> Result<Self> {
        let path = config_path(project_dir);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize taskboard.toml")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// File (explicit path or the project default) plus `.env` and
    /// environment overrides.
    pub fn resolve(project_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::load_or_default(project_dir)?,
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `TASKBOARD_*` overrides read through `lookup`. Empty values
    /// are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("TASKBOARD_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("TASKBOARD_PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "TASKBOARD_PORT".to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(path) = get("TASKBOARD_DB_PATH") {
            self.server.db_path = PathBuf::from(path);
        }
        if let Some(url) = get("TASKBOARD_APP_URL") {
            self.server.app_url = url;
        }
        if let Some(url) = get("TASKBOARD_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(url);
        }
        if let Some(format) = get("TASKBOARD_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }

    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            db_path: self.server.db_path.clone(),
            app_url: self.server.app_url.trim_end_matches('/').to_string(),
            webhook_url: self.notifications.webhook_url.clone(),
            dev_mode: self.server.dev,
        }
    }
}
