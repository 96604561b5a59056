//! Configuration system for sciplan
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (SCIPLAN_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};

/// Main client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Gateway identity and catalog settings
    pub gateway: GatewaySettings,

    /// Agent protocol settings
    pub agent: AgentSettings,

    /// Fallback storage settings
    pub storage: StorageSettings,

    /// Plan workflow and persistence settings
    pub plan: PlanSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Gateway connection and profile settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Base URL of the gateway REST API
    pub api_url: String,

    /// Gateway identifier sent in request claims
    pub gateway_id: String,

    /// User name sent in request claims
    pub username: String,

    /// Bearer token (prefer SCIPLAN_ACCESS_TOKEN over writing it to disk)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Project experiments are filed under
    pub project: String,

    /// Group resource profile used for allocations
    pub group: String,

    /// Storage resource holding experiment working directories
    pub storage_resource: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Agent protocol settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Base URL of the agent protocol endpoint
    pub api_url: String,

    /// Host injected into submissions so remote agents can connect back
    pub server_host: String,

    /// Delay between result polls in milliseconds
    pub poll_interval_ms: u64,

    /// Give up waiting for a result after this many seconds (0 = wait forever)
    pub poll_timeout_secs: u64,

    /// Python version requested for script execution
    pub python_version: String,
}

/// Fallback storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Local directory under which storage hosts are mounted
    pub mount_root: String,
}

/// Plan workflow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanSettings {
    /// Plan store backend: "file" or "remote"
    pub store: String,

    /// Directory used by the file plan store
    pub store_dir: String,

    /// Minutes between status polls while waiting for completion
    pub poll_interval_minutes: f64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.gateway.sciplan.org".to_string(),
            gateway_id: "default".to_string(),
            username: String::new(),
            access_token: None,
            project: "Default Project".to_string(),
            group: "Default".to_string(),
            storage_resource: "gateway-storage".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.gateway.sciplan.org".to_string(),
            server_host: "api.gateway.sciplan.org".to_string(),
            poll_interval_ms: 1000,
            poll_timeout_secs: 0,
            python_version: "3.10".to_string(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            mount_root: "~/.sciplan/mounts".to_string(),
        }
    }
}

impl Default for PlanSettings {
    fn default() -> Self {
        Self {
            store: "file".to_string(),
            store_dir: "~/.sciplan/plans".to_string(),
            poll_interval_minutes: 1.0,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

impl AgentSettings {
    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Poll timeout, `None` when unbounded
    pub fn poll_timeout(&self) -> Option<Duration> {
        (self.poll_timeout_secs > 0).then(|| Duration::from_secs(self.poll_timeout_secs))
    }
}

impl PlanSettings {
    /// Interval between completion polls
    pub fn poll_interval(&self) -> Result<Duration> {
        minutes_to_interval("plan.poll_interval_minutes", self.poll_interval_minutes)
    }
}

/// Positive, representable interval from a number of minutes
pub fn minutes_to_interval(field: &str, minutes: f64) -> Result<Duration> {
    if !(minutes.is_finite() && minutes > 0.0) {
        return Err(Error::config_field_invalid(
            field,
            format!("poll interval must be a positive number of minutes, got {}", minutes),
        ));
    }
    Duration::try_from_secs_f64(minutes * 60.0).map_err(|_| {
        Error::config_field_invalid(field, format!("poll interval of {} minutes is too large", minutes))
    })
}

impl ClientConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        let config_file = Self::find_config_file(config_path)?;
        if let Some(path) = config_file {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
                message: format!("{}: {}", path.display(), e.message()),
                source: Some(e),
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        config.apply_env_overrides();
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            PathBuf::from("sciplan.toml"),
            dirs::config_dir()
                .map(|p| p.join("sciplan").join("config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".sciplan").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/sciplan/config.toml"),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Gateway settings
        if let Ok(val) = std::env::var("SCIPLAN_API_URL") {
            self.gateway.api_url = val;
        }
        if let Ok(val) = std::env::var("SCIPLAN_GATEWAY_ID") {
            self.gateway.gateway_id = val;
        }
        if let Ok(val) = std::env::var("SCIPLAN_USERNAME") {
            self.gateway.username = val;
        }
        if let Ok(val) = std::env::var("SCIPLAN_ACCESS_TOKEN") {
            self.gateway.access_token = Some(val);
        }
        if let Ok(val) = std::env::var("SCIPLAN_PROJECT") {
            self.gateway.project = val;
        }
        if let Ok(val) = std::env::var("SCIPLAN_GROUP") {
            self.gateway.group = val;
        }
        if let Ok(val) = std::env::var("SCIPLAN_STORAGE_RESOURCE") {
            self.gateway.storage_resource = val;
        }

        // Agent settings
        if let Ok(val) = std::env::var("SCIPLAN_AGENT_URL") {
            self.agent.api_url = val;
        }
        if let Ok(val) = std::env::var("SCIPLAN_AGENT_SERVER_HOST") {
            self.agent.server_host = val;
        }
        if let Ok(val) = std::env::var("SCIPLAN_AGENT_POLL_INTERVAL_MS") {
            if let Ok(n) = val.parse() {
                self.agent.poll_interval_ms = n;
            }
        }
        if let Ok(val) = std::env::var("SCIPLAN_AGENT_POLL_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.agent.poll_timeout_secs = n;
            }
        }

        // Storage settings
        if let Ok(val) = std::env::var("SCIPLAN_MOUNT_ROOT") {
            self.storage.mount_root = val;
        }

        // Plan settings
        if let Ok(val) = std::env::var("SCIPLAN_PLAN_STORE") {
            self.plan.store = val;
        }
        if let Ok(val) = std::env::var("SCIPLAN_PLAN_DIR") {
            self.plan.store_dir = val;
        }
        if let Ok(val) = std::env::var("SCIPLAN_POLL_INTERVAL_MINUTES") {
            if let Ok(n) = val.parse() {
                self.plan.poll_interval_minutes = n;
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("SCIPLAN_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("SCIPLAN_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("SCIPLAN_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.storage.mount_root = expand_path(&self.storage.mount_root);
        self.plan.store_dir = expand_path(&self.plan.store_dir);

        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_http_url("gateway.api_url", &self.gateway.api_url)?;
        validate_http_url("agent.api_url", &self.agent.api_url)?;

        if self.agent.server_host.is_empty() {
            return Err(Error::config_field_invalid(
                "agent.server_host",
                "agent server host cannot be empty",
            ));
        }

        if self.agent.poll_interval_ms == 0 {
            return Err(Error::config_field_invalid(
                "agent.poll_interval_ms",
                "poll interval must be greater than zero",
            ));
        }

        self.plan.poll_interval()?;

        let valid_stores = ["file", "remote"];
        if !valid_stores.contains(&self.plan.store.as_str()) {
            return Err(Error::config_field_invalid(
                "plan.store",
                format!(
                    "Invalid plan store '{}'. Must be one of: {}",
                    self.plan.store,
                    valid_stores.join(", ")
                ),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Directory of the file plan store
    pub fn plan_store_dir(&self) -> PathBuf {
        PathBuf::from(&self.plan.store_dir)
    }

    /// Root under which storage hosts are mounted
    pub fn mount_root(&self) -> PathBuf {
        PathBuf::from(&self.storage.mount_root)
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| Error::config_field_invalid(field, format!("invalid URL '{}': {}", value, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::config_field_invalid(
            field,
            format!("URL must use http or https, got '{}'", other),
        )),
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".sciplan")
                .join("config.toml")
        });

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# sciplan configuration

[gateway]
# Base URL of the gateway REST API
api_url = "https://api.gateway.sciplan.org"

# Gateway identifier and user sent with every request
gateway_id = "default"
username = ""

# Access token (prefer the SCIPLAN_ACCESS_TOKEN environment variable)
# access_token = ""

# Profile used to resolve submissions
project = "Default Project"
group = "Default"
storage_resource = "gateway-storage"

# Request timeout in seconds
request_timeout_secs = 60

[agent]
# Agent protocol endpoint
api_url = "https://api.gateway.sciplan.org"

# Host remote jobs use to reach the agent service
server_host = "api.gateway.sciplan.org"

# Delay between result polls in milliseconds
poll_interval_ms = 1000

# Stop waiting for a result after this many seconds (0 = wait forever)
poll_timeout_secs = 0

# Python version for script execution
python_version = "3.10"

[storage]
# Local directory where storage hosts are mounted (fallback transport)
mount_root = "~/.sciplan/mounts"

[plan]
# Plan store: "file" or "remote"
store = "file"
store_dir = "~/.sciplan/plans"

# Minutes between status polls while waiting for completion
poll_interval_minutes = 1.0

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.sciplan/logs/sciplan.log"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}
