//! Lifecycle orchestration for the hearth service host.
//!
//! The host boots a service engine in two phases. Engine initialisation runs
//! first and reports monotone progress; once it reaches 100, the registered
//! startup tasks run one after another while the host is still
//! initialising. The host then enters the running state and hands the
//! foreground to a [`HostShell`].
//!
//! Every shutdown trigger (a terminal signal, a system shutdown notice,
//! a quit from the shell, or initialisation failure) funnels through one
//! [`ShutdownCoordinator`], so disposal runs exactly once regardless of how
//! many triggers race. Resources registered during startup are released in
//! reverse acquisition order before the engine itself is disposed.
//!
//! ## Crash capture
//!
//! The [`CrashReporter`] is installed as the panic hook. It writes one JSON
//! [`CrashRecord`] per fault into the log directory and exits with a code in
//! `100..=254` derived deterministically from the fault's class and source
//! location, so repeated occurrences of the same fault share an exit code.
//! A fault raised while another is being handled exits with `255`.

mod bootstrap;
pub mod crash;
mod environment;
mod health;
pub mod lifecycle;
mod localizer;
mod placeholder_engine;
mod process;
pub mod shell;
pub mod shutdown;
mod telemetry;

pub use bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader};
pub use crash::{CrashOutcome, CrashRecord, CrashReporter, Fault};
pub use environment::EnvironmentSnapshot;
pub use health::{HealthReporter, StructuredHealthReporter};
pub use lifecycle::{Engine, EngineError, LifecycleHost, LifecycleState, StartError, StartOutcome};
pub use localizer::{build_localizer, messages};
pub use placeholder_engine::{HeartbeatTask, IdleEngine};
pub use process::{EXIT_CONFIGURATION, EXIT_SOFTWARE, LaunchError, LaunchOutcome, run_service};
pub use shell::{HeadlessShell, HostShell};
pub use shutdown::{ShutdownCoordinator, ShutdownHandle};
pub use telemetry::{LOG_FILE_PREFIX, LogManager, Logger, TelemetryError, initialise};

#[cfg(test)]
mod tests;
