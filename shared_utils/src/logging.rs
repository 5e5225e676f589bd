//! Logging Module
//!
//! tracing-based logging with two sinks:
//! - a daily rolling file in the log directory (system temp dir by default)
//! - stderr, for interactive runs
//!
//! # Examples
//!
//! ```no_run
//! use shared_utils::logging::{LogConfig, init_logging};
//! use tracing::info;
//!
//! init_logging("img_convert", LogConfig::default()).expect("Failed to initialize logging");
//! info!("Program started");
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory holding the rolling log files
    pub log_dir: PathBuf,
    /// Number of log files kept after pruning
    pub max_files: usize,
    /// Minimum level, unless RUST_LOG says otherwise
    pub level: Level,
    /// Mirror events to stderr
    pub stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: std::env::temp_dir(),
            max_files: 5,
            level: Level::INFO,
            stderr: true,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.log_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_max_files(mut self, count: usize) -> Self {
        self.max_files = count;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_stderr(mut self, enabled: bool) -> Self {
        self.stderr = enabled;
        self
    }
}

/// Install the global subscriber. Can only succeed once per process.
///
/// The log file is named `{program_name}.log` plus the rotation date suffix.
pub fn init_logging(program_name: &str, config: LogConfig) -> Result<()> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", config.log_dir))?;

    let log_file_name = format!("{}.log", program_name);
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, &log_file_name);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(program_name, config.level)));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let stderr_layer = config.stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
            .with_line_number(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::info!(
        program = program_name,
        log_dir = ?config.log_dir,
        log_file = log_file_name,
        max_files = config.max_files,
        level = ?config.level,
        "Logging system initialized"
    );

    cleanup_old_logs(&config.log_dir, program_name, config.max_files)?;

    Ok(())
}

/// Filter directive covering both crates of the workspace.
fn default_directive(program_name: &str, level: Level) -> String {
    let target = program_name.replace('-', "_");
    format!("{}={},shared_utils={}", target, level, level)
}

/// Remove all but the `max_files` most recently modified `{program_name}*.log` files.
fn cleanup_old_logs(log_dir: &Path, program_name: &str, max_files: usize) -> Result<()> {
    use std::fs;

    let entries = fs::read_dir(log_dir)
        .with_context(|| format!("Failed to read log directory: {:?}", log_dir))?;

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let is_ours = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .map(|n| n.starts_with(program_name) && n.contains(".log"))
            .unwrap_or(false);
        if !is_ours {
            continue;
        }

        if let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) {
            log_files.push((path, modified));
        }
    }

    if log_files.len() <= max_files {
        return Ok(());
    }

    // newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(max_files) {
        match fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = ?path, "Removed old log file"),
            Err(e) => tracing::warn!(path = ?path, error = %e, "Failed to remove old log file"),
        }
    }

    Ok(())
}

pub fn log_operation_end(operation: &str, duration: Duration, success: bool) {
    if success {
        tracing::info!(
            operation = operation,
            duration_secs = duration.as_secs_f64(),
            "Operation completed successfully"
        );
    } else {
        tracing::error!(
            operation = operation,
            duration_secs = duration.as_secs_f64(),
            "Operation failed"
        );
    }
}
