//! Startup task double that records the host state it observes.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use futures::future::BoxFuture;

use crate::lifecycle::{EngineError, LifecycleState, StartupContext, StartupTask};

use super::engine::ReleaseLog;

/// What a task saw when it ran.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskObservation {
    pub task: String,
    pub state: LifecycleState,
    pub progress: f64,
}

type Hook = Box<dyn Fn() -> Option<JoinHandle<()>> + Send + Sync>;

/// Startup task that appends a [`TaskObservation`] to a shared journal.
pub struct RecordingTask {
    name: String,
    journal: Arc<Mutex<Vec<TaskObservation>>>,
    failure: Option<String>,
    resource: Option<ReleaseLog>,
    hook: Option<Hook>,
    spawned: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl RecordingTask {
    #[must_use]
    pub fn new(name: &str, journal: &Arc<Mutex<Vec<TaskObservation>>>) -> Self {
        Self {
            name: name.to_owned(),
            journal: Arc::clone(journal),
            failure: None,
            resource: None,
            hook: None,
            spawned: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fails with `message` after recording.
    #[must_use]
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_owned());
        self
    }

    /// Registers a resource named after the task, released into `log`.
    #[must_use]
    pub fn registering(mut self, log: ReleaseLog) -> Self {
        self.resource = Some(log);
        self
    }

    /// Runs `hook` while the task executes. Threads it returns are kept for
    /// [`join_spawned`].
    #[must_use]
    pub fn with_hook(
        mut self,
        hook: impl Fn() -> Option<JoinHandle<()>> + Send + Sync + 'static,
    ) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Handle for joining threads spawned by the hook.
    #[must_use]
    pub fn spawned(&self) -> Arc<Mutex<Vec<JoinHandle<()>>>> {
        Arc::clone(&self.spawned)
    }
}

impl StartupTask for RecordingTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, context: &'a StartupContext<'a>) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            self.journal
                .lock()
                .expect("journal mutex poisoned")
                .push(TaskObservation {
                    task: self.name.clone(),
                    state: context.state(),
                    progress: context.progress(),
                });
            if let Some(log) = &self.resource {
                let log = log.clone();
                let label = self.name.clone();
                context
                    .resources()
                    .register(self.name.clone(), move || log.push(label));
            }
            if let Some(hook) = &self.hook
                && let Some(handle) = hook()
            {
                self.spawned
                    .lock()
                    .expect("spawned mutex poisoned")
                    .push(handle);
            }
            match &self.failure {
                Some(message) => Err(EngineError::new(message.clone())),
                None => Ok(()),
            }
        })
    }
}

/// Joins every thread in `spawned`.
pub fn join_spawned(spawned: &Arc<Mutex<Vec<JoinHandle<()>>>>) {
    let handles: Vec<_> = spawned
        .lock()
        .expect("spawned mutex poisoned")
        .drain(..)
        .collect();
    for handle in handles {
        handle.join().expect("spawned thread panicked");
    }
}
