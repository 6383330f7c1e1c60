//! Command relay and process supervision for a local WebDriver server.
//!
//! The agent sits between a test-orchestration controller and a local
//! automation server (Selenium standalone). It provides:
//! - `supervisor`: start, health-check and stop the server subprocess
//! - `bridge`: a wire client bound to an existing WebDriver session
//! - `dispatch`: per-adapter serialized command execution, including wait-until polling
//! - `artifact`: inline screen stripping and screenshot extraction

pub mod artifact;
pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod models;
pub mod paths;
pub mod supervisor;

#[cfg(any(test, feature = "test-utils"))]
pub mod testkit;

pub use bridge::{BridgeError, SessionDriverBridge};
pub use config::{DispatchConfig, DriverPaths, ServerConfig, WaitDefaults};
pub use dispatch::{CommandDispatcher, ContextError, ContextRegistry};
pub use models::{CommandRequest, CommandResult, EnvelopeError, RouteKey, WaitUntil};
pub use supervisor::{
    LaunchSpec, ProcessSupervisor, ServerProcessHandle, SupervisorError, SupervisorState,
};
