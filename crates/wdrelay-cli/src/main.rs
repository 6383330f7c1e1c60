mod cli;
mod commands;
mod config;
mod controller;
mod error;
mod logging;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::AgentSettings;
use wdrelay_core::ProcessSupervisor;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error::handle_error(err);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = AgentSettings::load(cli.config.as_deref())?.with_overrides(cli.host, cli.port);

    // Always log to file: stdout carries the controller stream in `run`.
    let _guard = logging::init(&settings.log_dir(), cli.verbose)?;

    let supervisor = ProcessSupervisor::new(settings.server_config())?;

    match cli.command {
        Commands::Check => commands::check::run(&supervisor).await,
        Commands::Start => commands::start::run(&supervisor).await,
        Commands::Run(args) => commands::run::run(&supervisor, &settings, args).await,
    }
}
