//! Prospector CLI — private credit company research from the terminal.
//!
//! Searches, scrapes, and analyzes lender websites and news coverage,
//! then emits structured intelligence with a deterministic fit score.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
