use color_eyre::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

/// Set up tracing: always to `<data_dir>/rr.log`, also to stderr when verbose.
///
/// `RUST_LOG` wins over the configured level. Keep the returned guard alive
/// until exit or buffered lines are lost.
pub fn init(config: &Config, verbose: bool) -> Result<WorkerGuard> {
  let log_dir = config.data_dir()?;
  std::fs::create_dir_all(&log_dir)?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
    &log_dir, "rr.log",
  ));

  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

  let stderr_layer = verbose.then(|| {
    fmt::layer()
      .with_writer(std::io::stderr)
      .with_target(false)
  });

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .with(stderr_layer)
    .try_init()?;

  Ok(guard)
}
