use crate::paths;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4444;

/// Paths to the browser-engine driver binaries handed to the server as
/// `-Dwebdriver.<engine>.driver` properties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverPaths {
    pub chrome: Option<PathBuf>,
    pub gecko: Option<PathBuf>,
    pub edge: Option<PathBuf>,
}

impl DriverPaths {
    /// Drivers shipped under `<plugin dir>/bin` on Windows installs.
    pub fn bundled_windows() -> Self {
        let bin = paths::default_plugin_dir().join("bin");
        Self {
            chrome: Some(bin.join("chromedriver.exe")),
            gecko: Some(bin.join("geckodriver.exe")),
            edge: Some(bin.join("msedgedriver.exe")),
        }
    }

    pub fn properties(&self) -> Vec<(&'static str, &PathBuf)> {
        let mut props = Vec::new();
        if let Some(path) = &self.chrome {
            props.push(("webdriver.chrome.driver", path));
        }
        if let Some(path) = &self.gecko {
            props.push(("webdriver.gecko.driver", path));
        }
        if let Some(path) = &self.edge {
            props.push(("webdriver.edge.driver", path));
        }
        props
    }
}

/// Local automation server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Agent name, used in the server log file name.
    pub agent_name: String,
    pub java: String,
    pub server_jar: PathBuf,
    /// Wrapper script used instead of `java` (Windows installs ship one).
    pub launcher_script: Option<PathBuf>,
    pub drivers: DriverPaths,
    pub log_dir: PathBuf,
    pub connect_timeout: Duration,
    pub start_timeout: Duration,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let drivers = if cfg!(windows) {
            DriverPaths::bundled_windows()
        } else {
            DriverPaths::default()
        };
        let launcher_script = if cfg!(windows) {
            Some(paths::default_plugin_dir().join("bin").join("selenium-script.bat"))
        } else {
            None
        };

        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            agent_name: "selenium3".to_string(),
            java: "java".to_string(),
            server_jar: paths::default_server_jar(),
            launcher_script,
            drivers,
            log_dir: paths::default_logs_dir(),
            connect_timeout: Duration::from_secs(1),
            start_timeout: Duration::from_secs(20),
            poll_interval: Duration::from_secs(2),
            settle_delay: Duration::from_secs(2),
        }
    }
}

impl ServerConfig {
    /// Base URL of the wire protocol endpoint, with a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/wd/hub/", self.host, self.port)
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(format!("selenium_{}.log", self.agent_name))
    }
}

/// Fallbacks for the optional `wait-until-*` envelope fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitDefaults {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitDefaults {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub server_url: String,
    pub screenshot_extension: String,
    pub wait_defaults: WaitDefaults,
    /// Per-call HTTP timeout; immediate commands are otherwise unbounded.
    pub request_timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            server_url: ServerConfig::default().base_url(),
            screenshot_extension: "png".to_string(),
            wait_defaults: WaitDefaults::default(),
            request_timeout: None,
        }
    }
}
