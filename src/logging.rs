use std::{fs, path::Path};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// File logging with a daily rolling `editor.log` under `logs_dir`.
/// `RUST_LOG` wins over `default_filter`. The returned guard must be kept
/// alive for buffered lines to reach the file.
pub fn init_logging(logs_dir: &Path, default_filter: &str) -> Option<WorkerGuard> {
    fs::create_dir_all(logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(logs_dir, "editor.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .try_init()
        .ok()
        .map(|_| guard)
}
