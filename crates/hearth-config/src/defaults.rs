use std::time::Duration;

use crate::logging::LogFormat;

/// Directory created beside the executable when `-programdata` is absent.
pub const DEFAULT_PROGRAM_DATA_DIRECTORY: &str = "programdata";

/// Log directory name under the program-data root.
pub const LOG_DIRECTORY: &str = "logs";

/// Configuration directory name under the program-data root.
pub const CONFIG_DIRECTORY: &str = "config";

/// Runtime artefact directory name under the program-data root.
pub const RUN_DIRECTORY: &str = "run";

/// Configuration file looked up in [`CONFIG_DIRECTORY`].
pub const CONFIG_FILE_NAME: &str = "hearth.toml";

/// Default log filter expression used by the host.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Seconds the async runtime is given to wind down after disposal.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Default log filter expression used by the host.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default console logging format.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default runtime wind-down budget in seconds (serde helper).
pub fn default_shutdown_timeout_secs() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

/// Default runtime wind-down budget.
pub fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS)
}
