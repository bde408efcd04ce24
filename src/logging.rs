use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{self, LoggingConfig};

const DEFAULT_DIRECTIVE: &str = "aquallera=info";

/// Install the global subscriber.
///
/// Logs go to a daily rolling file unless `stderr` is set. `RUST_LOG` overrides
/// the default filter. Keep the returned guard alive until exit so buffered
/// lines are flushed.
pub fn init(logging: &LoggingConfig) -> Result<WorkerGuard> {
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

  let (writer, guard) = if logging.stderr {
    tracing_appender::non_blocking(std::io::stderr())
  } else {
    let directory = match &logging.directory {
      Some(dir) => dir.clone(),
      None => config::data_dir()?.join("logs"),
    };
    std::fs::create_dir_all(&directory)
      .map_err(|e| eyre!("Failed to create log directory {}: {}", directory.display(), e))?;
    tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, "aquallera.log"))
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(logging.stderr)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  Ok(guard)
}
