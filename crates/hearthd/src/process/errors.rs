//! Defines the unified error surface for launching the service host.

use std::io;
use std::sync::Arc;
use std::time::SystemTimeError;

use camino::Utf8PathBuf;
use nix::errno::Errno;
use thiserror::Error;

use ortho_config::OrthoError;

use hearth_config::PathsError;

use crate::lifecycle::StartError;
use crate::shell::ShellError;
use crate::shutdown::ShutdownError;
use crate::telemetry::TelemetryError;

/// `EX_CONFIG`: configuration or path resolution failed.
pub const EXIT_CONFIGURATION: u8 = 78;
/// `EX_SOFTWARE`: initialisation or supervision failed.
pub const EXIT_SOFTWARE: u8 = 70;

/// Errors surfaced while launching or supervising the host.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Resolving or preparing the program-data layout failed.
    #[error("failed to resolve application paths: {source}")]
    Paths {
        /// Underlying path error.
        #[source]
        source: PathsError,
    },
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry could not be initialised.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Lock file creation failed.
    #[error("failed to create lock file '{path}': {source}")]
    LockCreate {
        /// Lock file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A running host already holds the lock.
    #[error("service host already running with pid {pid}")]
    AlreadyRunning {
        /// PID recorded in the existing PID file.
        pid: u32,
    },
    /// Removing a stale runtime artefact failed.
    #[error("failed to remove stale file '{path}': {source}")]
    Cleanup {
        /// Path of the artefact that could not be removed.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the PID file failed.
    #[error("failed to write pid file '{path}': {source}")]
    PidWrite {
        /// PID file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the health snapshot failed.
    #[error("failed to write health snapshot '{path}': {source}")]
    HealthWrite {
        /// Health file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Serialising the health snapshot failed.
    #[error("failed to serialise health snapshot: {source}")]
    HealthSerialise {
        /// Underlying serialisation error.
        #[from]
        source: serde_json::Error,
    },
    /// Obtaining the current timestamp failed.
    #[error("failed to read system time: {source}")]
    Clock {
        /// Underlying system time error.
        #[source]
        source: SystemTimeError,
    },
    /// Attempting to probe an existing PID failed.
    #[error("failed to check existing process {pid}: {source}")]
    CheckProcess {
        /// PID that failed to probe.
        pid: u32,
        /// Underlying OS error.
        source: Errno,
    },
    /// Health updates were attempted before writing the PID file.
    #[error("pid must be written before updating health state")]
    MissingPid,
    /// Building the async runtime failed.
    #[error("failed to build async runtime: {source}")]
    Runtime {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Registering for session notifications failed.
    #[error("failed to register for session notifications: {source}")]
    Session {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// The lifecycle host failed to start.
    #[error("service host failed to start: {source}")]
    Start {
        /// Underlying start error.
        #[source]
        source: StartError,
    },
    /// The host shell failed.
    #[error("host shell failed: {source}")]
    Shell {
        /// Underlying shell error.
        #[source]
        source: ShellError,
    },
    /// Writing the version to standard output failed.
    #[error("failed to print version: {source}")]
    VersionOutput {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Paths { .. }
            | Self::Config { .. }
            | Self::Telemetry { .. }
            | Self::AlreadyRunning { .. } => EXIT_CONFIGURATION,
            _ => EXIT_SOFTWARE,
        }
    }
}

impl From<PathsError> for LaunchError {
    fn from(source: PathsError) -> Self {
        Self::Paths { source }
    }
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Session { source }
    }
}

impl From<StartError> for LaunchError {
    fn from(source: StartError) -> Self {
        Self::Start { source }
    }
}

impl From<ShellError> for LaunchError {
    fn from(source: ShellError) -> Self {
        Self::Shell { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::EngineError;
    use rstest::rstest;

    #[rstest]
    #[case(LaunchError::AlreadyRunning { pid: 7 }, EXIT_CONFIGURATION)]
    #[case(LaunchError::MissingPid, EXIT_SOFTWARE)]
    #[case(
        LaunchError::Start { source: StartError::Initialization { source: EngineError::new("disk") } },
        EXIT_SOFTWARE
    )]
    #[case(
        LaunchError::Paths { source: PathsError::NonUtf8 { path: "bad".into() } },
        EXIT_CONFIGURATION
    )]
    fn errors_map_to_exit_codes(#[case] error: LaunchError, #[case] expected: u8) {
        assert_eq!(error.exit_code(), expected);
    }
}
