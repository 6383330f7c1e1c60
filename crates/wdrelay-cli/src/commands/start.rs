use super::launch_server;
use anyhow::{Context, Result};
use tracing::info;
use wdrelay_core::ProcessSupervisor;

/// Start the server, keep it up until Ctrl-C, then stop it.
pub async fn run(supervisor: &ProcessSupervisor) -> Result<()> {
    let handle = launch_server(supervisor).await?;
    println!(
        "Automation server started (pid {}) on {}:{}",
        handle.pid, handle.host, handle.port
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Interrupted, stopping automation server");

    supervisor.stop().await?;
    println!("Automation server stopped");
    Ok(())
}
