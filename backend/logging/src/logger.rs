//! Subscriber setup: a human console layer on stderr and a daily-rolling
//! NDJSON file under the log directory.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix of the rolling log.
pub const LOG_FILE_PREFIX: &str = "shellforge.log";

/// `RUST_LOG` when set, else `level`, else `info`.
pub fn resolve_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber and return the guard that flushes the
/// file writer on drop. Keep it alive for the whole session.
///
/// A log directory that cannot be created only disables the file layer.
/// A second install is ignored.
pub fn init_logger<P: AsRef<Path>>(log_dir: P, level: &str) -> Option<WorkerGuard> {
    let log_dir = log_dir.as_ref();
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("log directory {} unavailable: {e}", log_dir.display());
            (None, None)
        }
    };

    let _ = tracing_subscriber::registry()
        .with(resolve_filter(level))
        .with(console_layer)
        .with(file_layer)
        .try_init();
    guard
}
