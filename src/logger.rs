use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// File name prefix of the rolling log; the appender adds the date suffix.
pub const LOG_FILE_NAME: &str = "flowres.log";

/// Install the global tracing subscriber.
///
/// - `log_level` is an `EnvFilter` directive (e.g. `"info"` or `"flow_resource=debug"`).
/// - `log_dir`, when set, adds a plain-text daily rolling log in that directory.
///
/// Returns `Ok(false)` when a subscriber was already installed, in which case
/// nothing changes.
pub fn init_tracing(log_level: &str, log_dir: Option<&Path>) -> Result<bool> {
    // 1) Build an EnvFilter
    let env_filter = EnvFilter::try_new(log_level)
        .with_context(|| format!("Invalid log level directive: {}", log_level))?;

    // 2) Human readable output on stdout
    let stdout_layer = fmt::layer().with_target(true);

    // 3) Optional rolling file, no colors
    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log dir: {}", dir.display()))?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_NAME);
            Some(fmt::layer().with_writer(appender).with_ansi(false))
        }
        None => None,
    };

    // 4) Install subscriber, leaving an existing one in place
    let installed = Registry::default()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .is_ok();
    Ok(installed)
}

/// Where the rolling log for `log_dir` ends up (without the date suffix).
pub fn log_file_prefix(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}
