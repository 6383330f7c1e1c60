//! `wdrelay run`: serve a JSON-lines controller session on stdin/stdout.
//!
//! Inbound lines:
//! - `{"register": {"script_id": "...", "adapter_id": "..."}}`
//! - `{"unregister": {"script_id": "...", "adapter_id": "..."}}`
//! - `{"remove_script": {"script_id": "..."}}`
//! - `{"notify": <command envelope>}`

use super::launch_server;
use crate::cli::RunArgs;
use crate::config::AgentSettings;
use crate::controller::JsonLinesController;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use wdrelay_core::{CommandDispatcher, ContextRegistry, ProcessSupervisor};
use wdrelay_traits::NotifyTarget;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMessage {
    Register(NotifyTarget),
    Unregister(NotifyTarget),
    RemoveScript { script_id: String },
    Notify(Value),
}

pub async fn run(
    supervisor: &ProcessSupervisor,
    settings: &AgentSettings,
    args: RunArgs,
) -> Result<()> {
    // Everything fallible runs before the server is spawned.
    let controller = Arc::new(JsonLinesController::stdout(args.results_dir));
    let dispatch_config = settings.dispatch_config(supervisor.config())?;
    let dispatcher = CommandDispatcher::new(controller, dispatch_config)?;
    let registry = ContextRegistry::new();

    if args.no_server {
        info!("Attaching to running automation server");
    } else {
        launch_server(supervisor).await?;
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let outcome = tokio::select! {
        outcome = serve(stdin, &dispatcher, &registry) => outcome,
        signal = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            signal.context("Failed to listen for Ctrl-C")
        }
    };

    registry.drain().await;
    if !args.no_server {
        supervisor.stop().await?;
    }
    outcome
}

/// Read control messages until EOF.
pub async fn serve<R>(
    reader: R,
    dispatcher: &CommandDispatcher,
    registry: &ContextRegistry,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ControlMessage>(line) {
            Ok(message) => apply(message, dispatcher, registry),
            Err(err) => warn!(error = %err, "Ignoring invalid control message"),
        }
    }
    debug!("Control stream closed");
    Ok(())
}

fn apply(message: ControlMessage, dispatcher: &CommandDispatcher, registry: &ContextRegistry) {
    match message {
        ControlMessage::Register(target) => {
            registry.register_adapter(&target.script_id, &target.adapter_id);
        }
        ControlMessage::Unregister(target) => {
            registry.unregister_adapter(&target.script_id, &target.adapter_id);
        }
        ControlMessage::RemoveScript { script_id } => {
            registry.remove_script(&script_id);
        }
        ControlMessage::Notify(envelope) => {
            dispatcher.handle_notify(registry, envelope);
        }
    }
}
