use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

/// Keeps the background log writers alive; drop it only at shutdown.
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

fn appender(path: &Path) -> Result<RollingFileAppender> {
    let dir = path
        .parent()
        .with_context(|| format!("log path {} has no parent dir", path.display()))?;
    let file = path
        .file_name()
        .with_context(|| format!("log path {} has no file name", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("could not create log dir {}", dir.display()))?;
    Ok(RollingFileAppender::new(Rotation::DAILY, dir, file))
}

/// Install the global subscriber.
///
/// - `log_level` is an `EnvFilter` directive (e.g. `"info"`).
/// - `log_file` gets the plain text log, rotated daily.
/// - `event_file` gets one JSON line per dispatched request (target `request`).
pub fn init_tracing(root: PathBuf, log_file: &str, event_file: &str, log_level: &str) -> Result<LogGuards> {
    // 1) text log
    let (txt_writer, txt_guard) = tracing_appender::non_blocking(appender(&root.join(log_file))?);
    let txt_layer = fmt::layer()
        .with_writer(txt_writer)
        .with_ansi(false)
        .with_filter(EnvFilter::new(log_level));

    // 2) JSON request reports
    let (json_writer, json_guard) = tracing_appender::non_blocking(appender(&root.join(event_file))?);
    let json_layer = fmt::layer()
        .json()
        .with_writer(json_writer)
        .with_target(true)
        .with_filter(EnvFilter::new("request=info"));

    // 3) stdout, so `run` shows something
    let stdout_layer = fmt::layer()
        .with_thread_names(true)
        .with_filter(EnvFilter::new(log_level));

    Registry::default()
        .with(txt_layer)
        .with(json_layer)
        .with(stdout_layer)
        .try_init()
        .context("tracing subscriber already installed")?;

    Ok(LogGuards { _guards: vec![txt_guard, json_guard] })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appender_creates_missing_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs/nested/host.log");
        appender(&path).unwrap();
        assert!(dir.path().join("logs/nested").is_dir());
    }
}
