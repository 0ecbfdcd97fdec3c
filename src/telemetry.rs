//! Logging setup.
//!
//! Installs a `tracing` subscriber with two fmt layers: one on stdout and,
//! when `[logging].file` is set, one appending to the log file without ANSI
//! colours. `RUST_LOG` takes precedence over `[logging].level`.
//!
//! The returned [`LogGuard`] must stay alive for the whole process; dropping
//! it syncs the log file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Keeps the log file handle and flushes it on drop.
pub struct LogGuard {
    file: Option<Arc<File>>,
}

impl LogGuard {
    pub fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = (&**file).flush();
            let _ = file.sync_data();
        }
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Install the global subscriber.
pub fn init(config: &LoggingConfig) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    let file = match &config.file {
        Some(path) => {
            let handle = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(Arc::new(handle))
        }
        None => None,
    };

    let file_layer = file.clone().map(|handle| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(handle)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { file })
}
