// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Bridge Configuration
//
// Defines the configuration schema for a ruote-bridge deployment:
// - Engine location and administrative enable switch
// - Process definition directory
// - Launch queue retry policy
// - JSON API bind settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Top-level bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Administrative switch. When false, launches return `Disabled` and
    /// work item lookups return nothing.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the ruote-rest engine
    #[serde(default = "default_engine_url")]
    pub engine_url: Url,

    /// Directory holding process definitions
    #[serde(default = "default_processes_dir")]
    pub processes_dir: PathBuf,

    /// Per-request timeout against the engine
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Attempts per launch descriptor before it is dropped
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_engine_url() -> Url {
    Url::parse("http://localhost:4567").unwrap_or_else(|_| unreachable!("static URL"))
}

fn default_processes_dir() -> PathBuf {
    PathBuf::from("app/processes")
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5000
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            engine_url: default_engine_url(),
            processes_dir: default_processes_dir(),
            request_timeout_secs: default_request_timeout(),
            queue: QueueConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. RUOTE_BRIDGE_CONFIG_PATH environment variable
    /// 2. ./ruote-bridge.yaml (working directory)
    /// 3. ~/.ruote-bridge/config.yaml (user home)
    /// 4. /etc/ruote-bridge/config.yaml (Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("RUOTE_BRIDGE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./ruote-bridge.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".ruote-bridge").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/ruote-bridge/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RUOTE_BRIDGE_ENABLED") {
            match parse_flag(&val) {
                Some(enabled) => {
                    tracing::info!("Environment override: RUOTE_BRIDGE_ENABLED={}", enabled);
                    self.enabled = enabled;
                }
                None => {
                    tracing::warn!(
                        "Invalid value for RUOTE_BRIDGE_ENABLED: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("RUOTE_BRIDGE_ENGINE_URL") {
            match Url::parse(&val) {
                Ok(url) => {
                    tracing::info!("Environment override: RUOTE_BRIDGE_ENGINE_URL={}", url);
                    self.engine_url = url;
                }
                Err(e) => {
                    tracing::warn!("Invalid value for RUOTE_BRIDGE_ENGINE_URL: '{}' ({}). Ignoring.", val, e);
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.engine_url.scheme() {
            "http" | "https" => {}
            other => anyhow::bail!("Invalid engine_url scheme '{}'. Must be http or https", other),
        }

        if self.engine_url.host_str().is_none() {
            anyhow::bail!("engine_url must include a host");
        }

        if self.queue.max_attempts == 0 {
            anyhow::bail!("queue.max_attempts must be at least 1");
        }

        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// `scheme://host:port` of the engine, without a trailing slash
    pub fn engine_base(&self) -> String {
        self.engine_url.as_str().trim_end_matches('/').to_string()
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert!(config.enabled);
        assert_eq!(config.engine_base(), "http://localhost:4567");
        assert_eq!(config.processes_dir, PathBuf::from("app/processes"));
        assert_eq!(config.queue.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
enabled: false
engine_url: "http://ruote.internal:4567/"
processes_dir: /srv/processes
queue:
  max_attempts: 5
api:
  port: 9000
"#;
        let config = BridgeConfig::from_yaml_str(yaml).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.engine_base(), "http://ruote.internal:4567");
        assert_eq!(config.queue.max_attempts, 5);
        assert_eq!(config.queue.retry_delay_ms, 5000);
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.bind_address, "127.0.0.1");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BridgeConfig::default();
        config.engine_url = Url::parse("ftp://ruote.internal").unwrap();
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.queue.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("ON"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
