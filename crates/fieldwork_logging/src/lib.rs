//! Shared logging setup for the fieldwork binaries.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_TARGETS: &[&str] = &["fieldwork", "fieldwork_sinks", "odk2osm"];

/// Logging configuration shared by fieldwork binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Debug level to stdout instead of info level to stderr.
    pub verbose: bool,
    /// Optional plain-text copy of the log.
    pub log_file: Option<&'a Path>,
    /// Stdout carries machine-readable output; keep the console on stderr.
    pub json_mode: bool,
}

/// Keeps the background file writer alive; drop it last.
#[must_use = "dropping the guard stops the log file writer"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Default `EnvFilter` directives when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize tracing with a console layer and an optional file layer.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config.verbose)));

    let mut file_guard = None;
    let file_layer = match config.log_file {
        Some(path) => {
            let (dir, file_name) = split_log_path(path, config.app_name);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(&dir, &file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(env_filter.clone()),
            )
        }
        None => None,
    };

    let console_writer = if config.verbose && !config.json_mode {
        BoxMakeWriter::new(std::io::stdout)
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(console_writer)
        .with_target(config.verbose)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { _file: file_guard })
}

/// Split a log path into directory and file name, defaulting the name to
/// `<app_name>.log` when the path is a bare directory.
fn split_log_path(path: &Path, app_name: &str) -> (PathBuf, String) {
    if path.is_dir() {
        return (path.to_path_buf(), format!("{}.log", sanitize_name(app_name)));
    }
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("{}.log", sanitize_name(app_name)));
    (dir, file_name)
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
