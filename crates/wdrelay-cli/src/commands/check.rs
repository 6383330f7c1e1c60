use anyhow::Result;
use wdrelay_core::ProcessSupervisor;

pub async fn run(supervisor: &ProcessSupervisor) -> Result<()> {
    supervisor.check_available().await?;
    let config = supervisor.config();
    println!("Port {}:{} is available", config.host, config.port);
    Ok(())
}
