//! Structured telemetry initialisation for the service host.
//!
//! Two sinks are installed: a console layer on standard error whose format
//! follows [`Config::log_format`], and a JSON file layer writing a daily
//! rolling `hearthd.log` under the resolved log directory. Components obtain
//! a named [`Logger`] from the [`LogManager`] and parent their events on its
//! span so every line carries the logger name.

use std::io::{self, IsTerminal};

use camino::{Utf8Path, Utf8PathBuf};
use once_cell::sync::OnceCell;
use tracing::Span;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, fmt};

use hearth_config::{ApplicationPaths, Config, LogFormat};

/// File name prefix of the rolling log file. The appender appends the date.
pub const LOG_FILE_PREFIX: &str = "hearthd.log";

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to open the rolling log file.
    #[error("failed to open log file in '{path}': {source}")]
    Appender {
        /// Log directory.
        path: Utf8PathBuf,
        /// Underlying appender error.
        #[source]
        source: InitError,
    },
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Process-wide logging facility rooted at the resolved log directory.
///
/// The manager that performed installation owns the file writer's worker
/// guard; dropping it flushes buffered lines.
#[derive(Debug)]
pub struct LogManager {
    log_dir: Utf8PathBuf,
    worker: Option<WorkerGuard>,
}

impl LogManager {
    /// Directory receiving log files and crash records.
    #[must_use]
    pub fn log_dir(&self) -> &Utf8Path {
        self.log_dir.as_path()
    }

    /// Creates a named logger.
    #[must_use]
    pub fn logger(&self, name: &str) -> Logger {
        Logger::named(name)
    }

    /// Returns `true` when this manager installed the global subscriber.
    #[must_use]
    pub const fn owns_writer(&self) -> bool {
        self.worker.is_some()
    }
}

/// Named logger handed to components.
#[derive(Debug, Clone)]
pub struct Logger {
    name: String,
    span: Span,
}

impl Logger {
    /// Builds a logger without going through a [`LogManager`].
    ///
    /// Events are still routed through whichever subscriber is installed.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            span: tracing::info_span!("logger", name = %name),
        }
    }

    /// Logger name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Span used as the parent of this logger's events.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Repeated calls are idempotent: the first invocation installs the global
/// subscriber and keeps the file writer alive through the returned manager.
/// Later invocations return a manager that shares the installed sinks.
pub fn initialise(paths: &ApplicationPaths, config: &Config) -> Result<LogManager, TelemetryError> {
    let mut worker = None;
    TELEMETRY_GUARD.get_or_try_init(|| {
        worker = Some(install_subscriber(paths.log_dir(), config)?);
        Ok::<(), TelemetryError>(())
    })?;
    Ok(LogManager {
        log_dir: paths.log_dir().to_owned(),
        worker,
    })
}

fn install_subscriber(log_dir: &Utf8Path, config: &Config) -> Result<WorkerGuard, TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(log_dir.as_std_path())
        .map_err(|source| TelemetryError::Appender {
            path: log_dir.to_owned(),
            source,
        })?;
    let (writer, worker) = tracing_appender::non_blocking(appender);

    // The file sink is always JSON so crash records and log lines can be
    // correlated by tooling.
    let file_layer = fmt::layer()
        .json()
        .flatten_event(true)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339());

    let (json_console, compact_console) = match config.log_format() {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_writer(io::stderr)
                    .with_ansi(false)
                    .with_target(true)
                    .with_timer(UtcTime::rfc_3339()),
            ),
            None,
        ),
        LogFormat::Compact => (
            None,
            Some(
                fmt::layer()
                    .compact()
                    .with_writer(io::stderr)
                    // Colour only on interactive terminals.
                    .with_ansi(io::stderr().is_terminal())
                    .with_target(true)
                    .with_timer(UtcTime::rfc_3339()),
            ),
        ),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(json_console)
        .with(compact_console);

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    Ok(worker)
}
