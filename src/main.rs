mod cli;
mod config;
mod error;
mod gatherer;
mod knowledge;
mod llm;
mod logging;
mod producers;
mod prompt;
mod provider;
mod repo;
mod snapshot;

pub(crate) use error::AppResult;

use clap::Parser;
use tracing::error;

use crate::cli::{Cli, GetVerbosity};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let cmd = cli.cmd.unwrap_or_default();
    logging::setup_logger(cmd.get_verbosity().tracing_level_filter());

    if let Err(e) = cmd.run().await {
        error!("{e}");
        std::process::exit(1);
    }
}
