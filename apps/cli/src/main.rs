//! Newsroom CLI: turn an idea into a researched, reviewed, illustrated article.
//!
//! Runs the whole pipeline or any single stage against stored artifacts.

mod commands;
mod wiring;

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
