//! Snapshot of the process environment, logged at startup and embedded in
//! crash records.

use serde::{Deserialize, Serialize};
use tracing::info;

use hearth_config::ApplicationPaths;

use crate::telemetry::Logger;

const ENVIRONMENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::environment");

/// Facts about the running process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// Host version.
    pub version: String,
    /// Process identifier.
    pub pid: u32,
    /// Operating system family name.
    pub os: String,
    /// CPU architecture.
    pub arch: String,
    /// Executable location.
    pub application_path: String,
    /// Program-data root in effect.
    pub program_data: String,
    /// Whether `-programdata` overrode the default root.
    pub custom_program_data: bool,
    /// Log directory.
    pub log_dir: String,
    /// Launch arguments after the program name.
    pub arguments: Vec<String>,
}

impl EnvironmentSnapshot {
    /// Captures the snapshot for a host rooted at `paths`.
    #[must_use]
    pub fn capture(paths: &ApplicationPaths, arguments: Vec<String>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_owned(),
            pid: std::process::id(),
            os: std::env::consts::OS.to_owned(),
            arch: std::env::consts::ARCH.to_owned(),
            application_path: paths.application_path().to_string(),
            program_data: paths.program_data().to_string(),
            custom_program_data: paths.is_custom_program_data(),
            log_dir: paths.log_dir().to_string(),
            arguments,
        }
    }

    /// Arguments of the current process, converted lossily.
    #[must_use]
    pub fn process_arguments() -> Vec<String> {
        std::env::args_os()
            .skip(1)
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// Emits the snapshot as a single structured event.
    pub fn log(&self, logger: &Logger) {
        info!(
            target: ENVIRONMENT_TARGET,
            parent: logger.span(),
            version = %self.version,
            pid = self.pid,
            os = %self.os,
            arch = %self.arch,
            application_path = %self.application_path,
            program_data = %self.program_data,
            custom_program_data = self.custom_program_data,
            log_dir = %self.log_dir,
            arguments = ?self.arguments,
            "environment"
        );
    }
}
