use anyhow::Result;
use std::path::PathBuf;

const WDRELAY_DIR: &str = ".wdrelay";
const LOGS_DIR: &str = "logs";
const PLUGIN_DIR: &str = "plugins/selenium3";
const SERVER_JAR: &str = "selenium-server-standalone.jar";

/// Environment variable to override the wdrelay directory.
const WDRELAY_DIR_ENV: &str = "WDRELAY_DIR";

/// Resolve the wdrelay state directory.
/// Priority: WDRELAY_DIR env var > ~/.wdrelay/
pub fn resolve_wdrelay_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(WDRELAY_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|h| h.join(WDRELAY_DIR))
        .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))
}

/// Logs directory without touching the filesystem, falling back to the
/// system temp dir when no home directory is known.
pub fn default_logs_dir() -> PathBuf {
    resolve_wdrelay_dir()
        .map(|dir| dir.join(LOGS_DIR))
        .unwrap_or_else(|_| std::env::temp_dir().join("wdrelay-logs"))
}

/// Directory holding the Selenium server jar and driver binaries, next to the
/// agent executable.
pub fn default_plugin_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(PLUGIN_DIR)
}

pub fn default_server_jar() -> PathBuf {
    default_plugin_dir().join(SERVER_JAR)
}
