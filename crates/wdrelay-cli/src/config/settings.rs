use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use wdrelay_core::config::{DEFAULT_HOST, DEFAULT_PORT};
use wdrelay_core::{DispatchConfig, DriverPaths, ServerConfig, WaitDefaults};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub screenshot: ScreenshotSettings,
    #[serde(default)]
    pub wait_until: WaitUntilSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_java")]
    pub java: String,
    pub jar: Option<PathBuf>,
    pub launcher_script: Option<PathBuf>,
    #[serde(default)]
    pub drivers: DriverSettings,
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_start_timeout")]
    pub start_timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            java: default_java(),
            jar: None,
            launcher_script: None,
            drivers: DriverSettings::default(),
            log_dir: None,
            start_timeout_secs: default_start_timeout(),
            poll_interval_secs: default_poll_interval(),
            settle_delay_secs: default_settle_delay(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DriverSettings {
    pub chrome: Option<PathBuf>,
    pub gecko: Option<PathBuf>,
    pub edge: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentSection {
    #[serde(default = "default_agent_name")]
    pub name: String,
    pub request_timeout_secs: Option<f64>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScreenshotSettings {
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for ScreenshotSettings {
    fn default() -> Self {
        Self {
            extension: default_extension(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WaitUntilSettings {
    #[serde(default = "default_wait_timeout")]
    pub timeout: f64,
    #[serde(default = "default_wait_pool")]
    pub pool: f64,
}

impl Default for WaitUntilSettings {
    fn default() -> Self {
        Self {
            timeout: default_wait_timeout(),
            pool: default_wait_pool(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_java() -> String {
    "java".to_string()
}

fn default_start_timeout() -> u64 {
    20
}

fn default_poll_interval() -> u64 {
    2
}

fn default_settle_delay() -> u64 {
    2
}

fn default_agent_name() -> String {
    "selenium3".to_string()
}

fn default_extension() -> String {
    "png".to_string()
}

fn default_wait_timeout() -> f64 {
    10.0
}

fn default_wait_pool() -> f64 {
    0.5
}

impl AgentSettings {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_from_path(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("wdrelay").join("config.toml"))
    }

    /// Apply CLI overrides for host and port.
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }

    pub fn server_config(&self) -> ServerConfig {
        let defaults = ServerConfig::default();
        let server = &self.server;

        let drivers = if server.drivers.chrome.is_none()
            && server.drivers.gecko.is_none()
            && server.drivers.edge.is_none()
        {
            defaults.drivers.clone()
        } else {
            DriverPaths {
                chrome: server.drivers.chrome.clone(),
                gecko: server.drivers.gecko.clone(),
                edge: server.drivers.edge.clone(),
            }
        };

        ServerConfig {
            host: server.host.clone(),
            port: server.port,
            agent_name: self.agent.name.clone(),
            java: server.java.clone(),
            server_jar: server.jar.clone().unwrap_or(defaults.server_jar),
            launcher_script: server.launcher_script.clone().or(defaults.launcher_script),
            drivers,
            log_dir: server.log_dir.clone().unwrap_or(defaults.log_dir),
            connect_timeout: defaults.connect_timeout,
            start_timeout: Duration::from_secs(server.start_timeout_secs),
            poll_interval: Duration::from_secs(server.poll_interval_secs),
            settle_delay: Duration::from_secs(server.settle_delay_secs),
        }
    }

    pub fn dispatch_config(&self, server: &ServerConfig) -> Result<DispatchConfig> {
        let defaults = WaitDefaults {
            timeout: seconds("wait_until.timeout", self.wait_until.timeout)?,
            poll_interval: seconds("wait_until.pool", self.wait_until.pool)?,
        };
        let request_timeout = self
            .agent
            .request_timeout_secs
            .map(|secs| seconds("agent.request_timeout_secs", secs))
            .transpose()?;

        Ok(DispatchConfig {
            server_url: server.base_url(),
            screenshot_extension: self.screenshot.extension.clone(),
            wait_defaults: defaults,
            request_timeout,
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        self.server
            .log_dir
            .clone()
            .unwrap_or_else(wdrelay_core::paths::default_logs_dir)
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("Invalid duration for {}: {}", field, value))
}
