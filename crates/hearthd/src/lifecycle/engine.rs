//! Boundary between the host and the service engine it drives.

use std::error::Error as StdError;
use std::future::Future;

use futures::future::BoxFuture;
use thiserror::Error;

use hearth_config::{ApplicationPaths, CertificatePolicy};

use super::progress::InitProgress;
use super::resources::ResourceRegistry;
use super::state::{LifecycleState, StateHandle};
use crate::telemetry::Logger;

/// Failure reported by the engine or a startup task.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl EngineError {
    /// Builds an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Collaborators available to the engine while it initialises.
///
/// Initialisation must not produce externally visible side effects. Anything
/// acquired here is registered with [`InitContext::resources`] so disposal
/// can release it.
#[derive(Debug)]
pub struct InitContext<'a> {
    pub(crate) progress: &'a InitProgress,
    pub(crate) resources: &'a ResourceRegistry,
    pub(crate) paths: &'a ApplicationPaths,
    pub(crate) certificates: CertificatePolicy,
    pub(crate) logger: &'a Logger,
}

impl InitContext<'_> {
    /// Progress tracker. Values above 100 are clamped and decreases ignored.
    #[must_use]
    pub const fn progress(&self) -> &InitProgress {
        self.progress
    }

    /// Registry for resources acquired during initialisation.
    #[must_use]
    pub const fn resources(&self) -> &ResourceRegistry {
        self.resources
    }

    /// Resolved filesystem layout.
    #[must_use]
    pub const fn paths(&self) -> &ApplicationPaths {
        self.paths
    }

    /// Certificate policy for outbound connections.
    #[must_use]
    pub const fn certificates(&self) -> CertificatePolicy {
        self.certificates
    }

    /// Logger for engine events.
    #[must_use]
    pub const fn logger(&self) -> &Logger {
        self.logger
    }
}

/// Collaborators available to startup tasks.
#[derive(Debug)]
pub struct StartupContext<'a> {
    pub(crate) state: &'a StateHandle,
    pub(crate) progress: &'a InitProgress,
    pub(crate) resources: &'a ResourceRegistry,
    pub(crate) paths: &'a ApplicationPaths,
    pub(crate) logger: &'a Logger,
}

impl StartupContext<'_> {
    /// Lifecycle state at the time of the call.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state.current()
    }

    /// Initialisation progress; always complete while tasks run.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.progress.current()
    }

    /// Registry for resources the task acquires.
    #[must_use]
    pub const fn resources(&self) -> &ResourceRegistry {
        self.resources
    }

    /// Resolved filesystem layout.
    #[must_use]
    pub const fn paths(&self) -> &ApplicationPaths {
        self.paths
    }

    /// Logger for task events.
    #[must_use]
    pub const fn logger(&self) -> &Logger {
        self.logger
    }
}

/// Service engine driven by the lifecycle host.
pub trait Engine: Send + Sync + 'static {
    /// Version string reported for `-v`.
    fn version(&self) -> &str;

    /// Initialises the engine, reporting progress through the context.
    ///
    /// The returned future may be dropped before completion when shutdown is
    /// requested during initialisation.
    fn init(&self, context: &InitContext<'_>)
    -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Tears the engine down. Called once, after every registered resource
    /// has been released.
    fn dispose(&self);
}

/// Side-effecting action run after initialisation completes.
pub trait StartupTask: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Runs the task. Tasks must not request shutdown or dispose the host.
    fn run<'a>(&'a self, context: &'a StartupContext<'a>) -> BoxFuture<'a, Result<(), EngineError>>;
}
