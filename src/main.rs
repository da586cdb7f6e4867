use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use clinicdesk::{
    cli::{handle_command, Cli},
    utils::init_logger,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_logger(cli.verbose);

    if let Err(e) = handle_command(&cli).await {
        eprintln!("{} {:#}", "Error:".red(), e);
        std::process::exit(1);
    }

    Ok(())
}
