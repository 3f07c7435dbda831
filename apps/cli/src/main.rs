//! sourcemill CLI — run the knowledge-ingestion pipeline from the shell.
//!
//! Feeds local PDFs and blog URLs through the same pipeline the server
//! exposes, printing the result as JSON or a single Markdown document.

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
