/// Logging setup: console output plus one log file per day

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::utils::ensure_dir;

const LOG_FILE_PREFIX: &str = "log";
const LOG_FILE_SUFFIX: &str = "txt";

/// `<dir>/log.YYYY-MM-DD.txt`, the file written on the given UTC date
pub fn log_file_path(dir: &Path, date: chrono::NaiveDate) -> PathBuf {
    dir.join(format!("{}.{}.{}", LOG_FILE_PREFIX, date.format("%Y-%m-%d"), LOG_FILE_SUFFIX))
}

/// Appender that switches to a new file at every UTC midnight
pub fn daily_appender(dir: &Path) -> Result<RollingFileAppender> {
    ensure_dir(dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(dir)
        .with_context(|| format!("Failed to open a log file in {}", dir.display()))
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` when `verbose`.
/// With a `log_dir` every event is also written to the day's file through a
/// background writer; keep the returned guard alive until exit so the last
/// lines are flushed.
pub fn init_logging(log_dir: Option<&Path>, verbose: bool) -> Result<Option<WorkerGuard>> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(daily_appender(dir)?);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to install the logging subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_name() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            log_file_path(Path::new("logs"), date),
            PathBuf::from("logs/log.2024-03-07.txt")
        );
    }

    #[test]
    fn test_daily_appender_writes_todays_file() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("logs");

        let mut appender = daily_appender(&dir).unwrap();
        appender.write_all(b"restore started\n").unwrap();
        appender.flush().unwrap();

        let today = log_file_path(&dir, chrono::Utc::now().date_naive());
        let contents = std::fs::read_to_string(&today).unwrap();
        assert_eq!(contents, "restore started\n");
    }
}
