//! Test double for [`HealthReporter`] that records lifecycle events for assertions.

use std::sync::Mutex;

use crate::health::HealthReporter;
use crate::lifecycle::{EngineError, LifecycleState};
use crate::shutdown::ShutdownTrigger;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    InitializationStarted(String),
    InitializationSucceeded,
    InitializationFailed(String),
    StartupTaskFailed { task: String, message: String },
    HostRunning,
    ShutdownRequested(String),
    ShutdownStarted(LifecycleState),
    HostDisposed,
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Counts recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&HealthEvent) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn initialization_started(&self, version: &str) {
        self.record(HealthEvent::InitializationStarted(version.to_owned()));
    }

    fn initialization_succeeded(&self) {
        self.record(HealthEvent::InitializationSucceeded);
    }

    fn initialization_failed(&self, error: &EngineError) {
        self.record(HealthEvent::InitializationFailed(error.message().to_owned()));
    }

    fn startup_task_failed(&self, task: &str, error: &EngineError) {
        self.record(HealthEvent::StartupTaskFailed {
            task: task.to_owned(),
            message: error.message().to_owned(),
        });
    }

    fn host_running(&self) {
        self.record(HealthEvent::HostRunning);
    }

    fn shutdown_requested(&self, trigger: ShutdownTrigger) {
        self.record(HealthEvent::ShutdownRequested(trigger.to_string()));
    }

    fn shutdown_started(&self, state: LifecycleState) {
        self.record(HealthEvent::ShutdownStarted(state));
    }

    fn host_disposed(&self) {
        self.record(HealthEvent::HostDisposed);
    }
}
