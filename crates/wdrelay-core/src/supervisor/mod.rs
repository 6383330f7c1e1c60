//! Lifecycle of the local automation server process.
//!
//! `Unstarted -> Starting -> Ready -> Stopping -> Stopped`, with `StartFailed`
//! when the server never answered within the start timeout. There is no
//! automatic retry: a failed start needs an operator.

mod health;
mod process;

pub use health::{HealthChecker, HealthStatus, is_listening};
pub use process::{LaunchSpec, ServerProcessHandle};

use crate::config::ServerConfig;
use parking_lot::Mutex;
use process::ServerProcess;
use serde::Serialize;
use std::process::ExitStatus;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Selenium server already started in another instance on {host}:{port}")]
    AlreadyRunning { host: String, port: u16 },

    #[error("Unable to spawn automation server: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Automation server exited during startup with status {0}")]
    ExitedEarly(ExitStatus),

    #[error("Automation server did not answer within {0:?}")]
    StartTimeout(std::time::Duration),

    #[error("Cannot start automation server while {0:?}")]
    InvalidState(SupervisorState),

    #[error("Unable to stop automation server: {0}")]
    Stop(String),

    #[error("Unable to build health check client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Unstarted,
    Starting,
    Ready,
    StartFailed,
    Stopping,
    Stopped,
}

pub struct ProcessSupervisor {
    config: ServerConfig,
    launch: LaunchSpec,
    health: HealthChecker,
    state: Mutex<SupervisorState>,
    process: Mutex<Option<ServerProcess>>,
}

impl ProcessSupervisor {
    pub fn new(config: ServerConfig) -> Result<Self, SupervisorError> {
        let launch = LaunchSpec::selenium(&config);
        Self::with_launch_spec(config, launch)
    }

    pub fn with_launch_spec(
        config: ServerConfig,
        launch: LaunchSpec,
    ) -> Result<Self, SupervisorError> {
        let health = HealthChecker::new(config.base_url())?;
        Ok(Self {
            config,
            launch,
            health,
            state: Mutex::new(SupervisorState::Unstarted),
            process: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.lock()
    }

    pub fn handle(&self) -> Option<ServerProcessHandle> {
        self.process.lock().as_ref().map(|p| p.handle().clone())
    }

    /// Fails when another process already listens on the configured port.
    pub async fn check_available(&self) -> Result<(), SupervisorError> {
        if is_listening(&self.config.host, self.config.port, self.config.connect_timeout).await {
            error!(
                host = %self.config.host,
                port = self.config.port,
                "Selenium server already started in another instance"
            );
            return Err(SupervisorError::AlreadyRunning {
                host: self.config.host.clone(),
                port: self.config.port,
            });
        }
        Ok(())
    }

    /// Launch the server and wait until its HTTP endpoint answers.
    ///
    /// On timeout the child is left running; `stop` cleans it up.
    pub async fn start(&self) -> Result<ServerProcessHandle, SupervisorError> {
        if self.state() == SupervisorState::Ready
            && let Some(handle) = self.handle()
        {
            debug!(pid = handle.pid, "Automation server already started");
            return Ok(handle);
        }
        self.transition_to_starting()?;

        info!("Starting automation server...");
        debug!(command = %self.launch.command_line(), "External program called");

        let spawned = ServerProcess::spawn(&self.launch, &self.config.host, self.config.port);
        let handle = match spawned {
            Ok(process) => {
                let handle = process.handle().clone();
                *self.process.lock() = Some(process);
                handle
            }
            Err(err) => {
                error!(error = %err, "Unable to start automation server");
                self.set_state(SupervisorState::StartFailed);
                return Err(SupervisorError::Spawn(err));
            }
        };
        debug!(pid = handle.pid, "Automation server process started");

        match self.wait_until_ready().await {
            Ok(()) => {
                tokio::time::sleep(self.config.settle_delay).await;
                self.set_state(SupervisorState::Ready);
                info!(pid = handle.pid, "Automation server is started");
                Ok(handle)
            }
            Err(err) => {
                error!(error = %err, "Unable to start automation server");
                self.set_state(SupervisorState::StartFailed);
                Err(err)
            }
        }
    }

    async fn wait_until_ready(&self) -> Result<(), SupervisorError> {
        let started = Instant::now();
        while started.elapsed() < self.config.start_timeout {
            if let Some(status) = self.exit_status() {
                return Err(SupervisorError::ExitedEarly(status));
            }
            if self.health.check().await.healthy {
                return Ok(());
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        Err(SupervisorError::StartTimeout(self.config.start_timeout))
    }

    fn exit_status(&self) -> Option<ExitStatus> {
        let mut guard = self.process.lock();
        let process = guard.as_mut()?;
        match process.try_wait() {
            Ok(status) => status,
            Err(err) => {
                warn!(error = %err, "Unable to poll automation server process");
                None
            }
        }
    }

    /// Stop the server. The blocking kill/wait runs on a blocking worker;
    /// the state always ends as `Stopped`, even when termination failed.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        info!("Stopping automation server...");
        let Some(process) = self.process.lock().take() else {
            self.set_state(SupervisorState::Stopped);
            info!("Automation server is stopped");
            return Ok(());
        };
        self.set_state(SupervisorState::Stopping);

        let pid = process.handle().pid;
        let outcome = tokio::task::spawn_blocking(move || process.terminate()).await;
        self.set_state(SupervisorState::Stopped);

        match outcome {
            Ok(Ok(())) => {
                info!(pid, "Automation server is stopped");
                Ok(())
            }
            Ok(Err(err)) => {
                error!(pid, error = %err, "Unable to kill the process");
                Err(SupervisorError::Stop(err.to_string()))
            }
            Err(err) => {
                error!(pid, error = %err, "Unable to run stop worker");
                Err(SupervisorError::Stop(err.to_string()))
            }
        }
    }

    fn transition_to_starting(&self) -> Result<(), SupervisorError> {
        let mut state = self.state.lock();
        match *state {
            SupervisorState::Unstarted | SupervisorState::Stopped => {
                *state = SupervisorState::Starting;
                Ok(())
            }
            other => Err(SupervisorError::InvalidState(other)),
        }
    }

    fn set_state(&self, next: SupervisorState) {
        let mut state = self.state.lock();
        debug!(from = ?*state, to = ?next, "Supervisor state change");
        *state = next;
    }
}
