//! Logging setup: console output plus daily-rotated log files, with
//! timestamps in the server's local timezone so log lines correlate with
//! operator wall-clock time.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::Result;

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "vigil=info";

/// Filter directive applied when verbose logging is requested.
pub const VERBOSE_LOG_FILTER: &str = "vigil=debug";

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Initialize logging.
///
/// `RUST_LOG` wins when set; otherwise the verbose flag picks between the
/// default and debug directives. Returns the appender guard, which the
/// binary must keep alive so buffered file output is flushed on exit.
pub fn init_logging(log_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "vigil.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let fallback = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer),
        )
        .try_init()
        .map_err(|e| crate::Error::other(format!("Failed to set global subscriber: {}", e)))?;

    Ok(guard)
}

/// Path of today's rotated log file, matching `tracing_appender::rolling::daily` naming.
pub fn current_log_file(log_dir: &Path) -> PathBuf {
    log_dir.join(format!("vigil.log.{}", Local::now().format("%Y-%m-%d")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(DEFAULT_LOG_FILTER.contains("vigil=info"));
        assert!(VERBOSE_LOG_FILTER.contains("vigil=debug"));
    }

    #[test]
    fn test_current_log_file_naming() {
        let path = current_log_file(Path::new("/tmp/logs"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("vigil.log."));
    }
}
