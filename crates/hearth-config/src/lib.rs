//! Process-level inputs shared by the hearth service host.
//!
//! Everything in this crate is usable before logging exists: launch flags are
//! parsed into [`StartupOptions`], the filesystem layout is derived by
//! [`PathResolver`], and the layered [`Config`] is loaded with
//! `ortho_config` from built-in defaults, the optional `config/hearth.toml`
//! under the program-data root, and `HEARTH_*` environment variables.

mod certificates;
mod defaults;
mod logging;
mod options;
mod paths;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use certificates::{CertificatePolicy, CertificateTrust, ConnectionPurpose};
pub use defaults::{
    CONFIG_DIRECTORY, CONFIG_FILE_NAME, DEFAULT_LOG_FILTER, DEFAULT_PROGRAM_DATA_DIRECTORY,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS, LOG_DIRECTORY, RUN_DIRECTORY, default_log_filter,
    default_log_format, default_shutdown_timeout,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use options::{OptionValue, PROGRAM_DATA_FLAG, StartupOptions, VERSION_FLAG};
pub use paths::{ApplicationPaths, PathResolver, PathsError};

/// Layered configuration for the service host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "HEARTH")]
pub struct Config {
    /// Filter expression applied to every log sink.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Console log format.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Seconds granted to the async runtime to wind down after disposal.
    #[serde(default = "defaults::default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Accept any certificate on discovery and pairing connections.
    #[serde(default)]
    pub trust_discovery_certificates: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            trust_discovery_certificates: false,
        }
    }
}

impl Config {
    /// Loads configuration for a host rooted at `paths`.
    ///
    /// The configuration file under the program-data root is consulted when
    /// it exists; environment variables prefixed with `HEARTH_` override it.
    /// Launch flags are never forwarded to the loader because they use the
    /// host's own single-dash syntax.
    pub fn load_for_paths(paths: &ApplicationPaths) -> Result<Self, Arc<OrthoError>> {
        let mut args = vec![OsString::from(env!("CARGO_PKG_NAME"))];
        let config_file = paths.config_file();
        if config_file.as_std_path().is_file() {
            args.push(OsString::from("--config-path"));
            args.push(config_file.into_std_path_buf().into_os_string());
        }
        Self::load_from_iter(args)
    }

    /// Filter expression applied to every log sink.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Console log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Runtime wind-down budget.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Certificate policy handed to the engine.
    #[must_use]
    pub const fn certificate_policy(&self) -> CertificatePolicy {
        if self.trust_discovery_certificates {
            CertificatePolicy::trusting_discovery()
        } else {
            CertificatePolicy::strict()
        }
    }
}
