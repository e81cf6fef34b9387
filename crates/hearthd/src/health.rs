//! Structured health reporting for lifecycle events.

use std::sync::Arc;

use crate::lifecycle::{EngineError, LifecycleState};
use crate::shutdown::ShutdownTrigger;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked when engine initialisation begins.
    fn initialization_started(&self, version: &str);

    /// Invoked when engine initialisation completes.
    fn initialization_succeeded(&self);

    /// Invoked when engine initialisation fails.
    fn initialization_failed(&self, error: &EngineError);

    /// Invoked when a startup task fails. Startup continues.
    fn startup_task_failed(&self, task: &str, error: &EngineError);

    /// Invoked once the host reaches [`LifecycleState::Running`].
    fn host_running(&self);

    /// Invoked when the first shutdown trigger is accepted.
    fn shutdown_requested(&self, trigger: ShutdownTrigger);

    /// Invoked when the host leaves `state` for shutdown.
    fn shutdown_started(&self, state: LifecycleState);

    /// Invoked after disposal completes.
    fn host_disposed(&self);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn initialization_started(&self, version: &str) {
        (**self).initialization_started(version);
    }

    fn initialization_succeeded(&self) {
        (**self).initialization_succeeded();
    }

    fn initialization_failed(&self, error: &EngineError) {
        (**self).initialization_failed(error);
    }

    fn startup_task_failed(&self, task: &str, error: &EngineError) {
        (**self).startup_task_failed(task, error);
    }

    fn host_running(&self) {
        (**self).host_running();
    }

    fn shutdown_requested(&self, trigger: ShutdownTrigger) {
        (**self).shutdown_requested(trigger);
    }

    fn shutdown_started(&self, state: LifecycleState) {
        (**self).shutdown_started(state);
    }

    fn host_disposed(&self) {
        (**self).host_disposed();
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn initialization_started(&self, version: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "initialization_started",
            version,
            "initialising service engine"
        );
    }

    fn initialization_succeeded(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "initialization_succeeded",
            "service engine initialised"
        );
    }

    fn initialization_failed(&self, error: &EngineError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "initialization_failed",
            error = %error,
            "service engine failed to initialise"
        );
    }

    fn startup_task_failed(&self, task: &str, error: &EngineError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "startup_task_failed",
            task,
            error = %error,
            "startup task failed"
        );
    }

    fn host_running(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "host_running",
            "service host running"
        );
    }

    fn shutdown_requested(&self, trigger: ShutdownTrigger) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_requested",
            trigger = %trigger,
            "shutdown requested"
        );
    }

    fn shutdown_started(&self, state: LifecycleState) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_started",
            from = %state,
            "service host shutting down"
        );
    }

    fn host_disposed(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "host_disposed",
            "service host disposed"
        );
    }
}
