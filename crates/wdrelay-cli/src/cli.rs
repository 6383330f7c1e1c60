use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "wdrelay")]
#[command(version, about = "wdrelay - WebDriver command relay agent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ~/.config/wdrelay/config.toml)
    #[arg(long, global = true, env = "WDRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Automation server host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Automation server port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that no other automation server owns the port
    Check,

    /// Start the automation server and keep it running until Ctrl-C
    Start,

    /// Start the automation server and relay controller commands from stdin
    Run(RunArgs),
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Attach to an already running automation server
    #[arg(long)]
    pub no_server: bool,

    /// Directory that relative result paths are resolved against
    #[arg(long)]
    pub results_dir: Option<PathBuf>,
}
