use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{:#}", err).to_lowercase();

    if msg.contains("already started") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Stop the other instance, or pick another port with:");
        eprintln!("  {} wdrelay --port <port> start", "$".dimmed());
    }

    if msg.contains("unable to spawn") || msg.contains("did not answer") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check the java and jar paths in the [server] section of the config file.");
    }

    if msg.contains("connection refused") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Make sure the automation server is running, or drop --no-server.");
    }

    std::process::exit(1);
}
