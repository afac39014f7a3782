//! Log sinks: console, plus `protocol.log` and `error.log` in the output
//! directory of a scrape run.

use std::path::Path;

use anyhow::{bail, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const PROTOCOL_LOG: &str = "protocol.log";
pub const ERROR_LOG: &str = "error.log";

/// Flushes the file sinks when dropped; keep it alive until the process ends.
pub struct LogGuards {
    _protocol: WorkerGuard,
    _errors: WorkerGuard,
}

/// Installs the global subscriber. Without a `log_dir` events go to stderr
/// only, keeping stdout for command output. With one, events are printed to
/// stdout and written to `protocol.log`; warnings and errors also go to
/// `error.log`.
pub fn init(log_dir: Option<&Path>) -> Result<Option<LogGuards>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(dir) = log_dir else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };
    if !dir.is_dir() {
        bail!("Target path must be a directory: {}", dir.display());
    }

    let (protocol, protocol_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, PROTOCOL_LOG));
    let (errors, errors_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, ERROR_LOG));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stdout),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(protocol),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(errors.with_max_level(Level::WARN)),
        )
        .try_init()?;

    Ok(Some(LogGuards {
        _protocol: protocol_guard,
        _errors: errors_guard,
    }))
}
