mod bootstrap;
mod catalog;
mod cli;
mod engine;
mod layout;
mod model;
mod privilege;
mod prompt;
mod text_summary;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = cli::Cli::parse();

    match cli::run(args).await? {
        // Exit non-zero when any font could not be installed, for scripted use
        Some(summary) if summary.failed() > 0 => std::process::exit(1),
        _ => Ok(()),
    }
}
