use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use tracing::{debug, warn};

/// Command line of the automation server.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `java [-Dwebdriver.<engine>.driver=<path>]... -jar <jar> -port <port> -log <file> -debug true`
    ///
    /// When a launcher script is configured it replaces `java`.
    pub fn selenium(config: &ServerConfig) -> Self {
        let program = config
            .launcher_script
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.java));

        let mut args: Vec<String> = config
            .drivers
            .properties()
            .into_iter()
            .map(|(property, path)| format!("-D{}={}", property, path.display()))
            .collect();
        args.push("-jar".to_string());
        args.push(config.server_jar.display().to_string());
        args.push("-port".to_string());
        args.push(config.port.to_string());
        args.push("-log".to_string());
        args.push(config.log_file().display().to_string());
        args.push("-debug".to_string());
        args.push("true".to_string());

        Self { program, args }
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Public view of the running server process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerProcessHandle {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub host: String,
    pub port: u16,
}

/// Owned child process of the automation server.
pub(crate) struct ServerProcess {
    child: Child,
    handle: ServerProcessHandle,
}

impl ServerProcess {
    pub(crate) fn spawn(spec: &LaunchSpec, host: &str, port: u16) -> std::io::Result<Self> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group so the whole tree can be signalled on stop.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            unsafe {
                cmd.pre_exec(|| {
                    nix::unistd::setsid()
                        .map(|_| ())
                        .map_err(std::io::Error::other)
                });
            }
        }

        let child = cmd.spawn()?;
        let handle = ServerProcessHandle {
            pid: child.id(),
            started_at: Utc::now(),
            host: host.to_string(),
            port,
        };
        debug!(pid = handle.pid, "Automation server process spawned");

        Ok(Self { child, handle })
    }

    pub(crate) fn handle(&self) -> &ServerProcessHandle {
        &self.handle
    }

    pub(crate) fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Stop the process and reap it. Blocks until the child exits.
    pub(crate) fn terminate(mut self) -> std::io::Result<()> {
        let pid = self.handle.pid;
        debug!(pid, "Killing automation server process");

        #[cfg(windows)]
        {
            // No graceful terminate: force-kill the whole tree.
            match Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/F", "/T"])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                Ok(status) if !status.success() => {
                    warn!(pid, %status, "taskkill reported failure")
                }
                Ok(_) => {}
                Err(err) => warn!(pid, error = %err, "Unable to run taskkill"),
            }
            if let Err(err) = self.child.kill() {
                debug!(pid, error = %err, "Process already gone");
            }
        }

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            let Ok(raw_pid) = i32::try_from(pid) else {
                warn!(pid, "Process id out of range, skipping signal");
                self.child.wait()?;
                return Ok(());
            };
            match killpg(Pid::from_raw(raw_pid), Signal::SIGTERM) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(err) => {
                    warn!(pid, error = %err, "Unable to signal process group, killing child");
                    if let Err(err) = self.child.kill() {
                        debug!(pid, error = %err, "Process already gone");
                    }
                }
            }
        }

        self.child.wait()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverPaths;

    #[test]
    fn selenium_command_line_orders_properties_before_jar() {
        let config = ServerConfig {
            port: 5555,
            agent_name: "agent".to_string(),
            java: "java".to_string(),
            server_jar: PathBuf::from("/opt/selenium/server.jar"),
            launcher_script: None,
            drivers: DriverPaths {
                chrome: Some(PathBuf::from("/opt/chromedriver")),
                gecko: Some(PathBuf::from("/opt/geckodriver")),
                edge: None,
            },
            log_dir: PathBuf::from("/logs"),
            ..Default::default()
        };

        let spec = LaunchSpec::selenium(&config);
        assert_eq!(spec.program, PathBuf::from("java"));
        assert_eq!(
            spec.args,
            vec![
                "-Dwebdriver.chrome.driver=/opt/chromedriver",
                "-Dwebdriver.gecko.driver=/opt/geckodriver",
                "-jar",
                "/opt/selenium/server.jar",
                "-port",
                "5555",
                "-log",
                "/logs/selenium_agent.log",
                "-debug",
                "true",
            ]
        );
    }

    #[test]
    fn launcher_script_replaces_java() {
        let config = ServerConfig {
            launcher_script: Some(PathBuf::from("/opt/bin/selenium-script.bat")),
            ..Default::default()
        };
        let spec = LaunchSpec::selenium(&config);
        assert_eq!(spec.program, PathBuf::from("/opt/bin/selenium-script.bat"));
    }

    #[cfg(unix)]
    #[test]
    fn terminate_reaps_running_process() {
        let spec = LaunchSpec::new("sleep", vec!["30".to_string()]);
        let mut process = ServerProcess::spawn(&spec, "127.0.0.1", 1).unwrap();
        assert!(process.try_wait().unwrap().is_none());
        process.terminate().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn terminate_tolerates_exited_process() {
        let spec = LaunchSpec::new("true", Vec::new());
        let mut process = ServerProcess::spawn(&spec, "127.0.0.1", 1).unwrap();
        for _ in 0..50 {
            if process.try_wait().unwrap().is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        process.terminate().unwrap();
    }
}
