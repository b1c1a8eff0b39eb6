mod api;
mod assets;
mod cli;
mod config;
mod error;
mod logging;
mod store;
mod sync;

use clap::Parser;
use color_eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = cli::Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let _log_guard = logging::init(&config, args.verbose)?;

  cli::run(args.command, config).await
}
