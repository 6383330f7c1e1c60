pub mod check;
pub mod run;
pub mod start;

use anyhow::Result;
use tracing::warn;
use wdrelay_core::{ProcessSupervisor, ServerProcessHandle};

/// Availability check plus start. A server that failed to come up is
/// stopped before the error is returned.
pub async fn launch_server(supervisor: &ProcessSupervisor) -> Result<ServerProcessHandle> {
    supervisor.check_available().await?;
    match supervisor.start().await {
        Ok(handle) => Ok(handle),
        Err(err) => {
            if let Err(stop_err) = supervisor.stop().await {
                warn!(error = %stop_err, "Cleanup after failed start did not succeed");
            }
            Err(err.into())
        }
    }
}
