//! The lifecycle host: two-phase startup and the single disposal path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use hearth_config::{ApplicationPaths, CertificatePolicy, StartupOptions};

use super::LIFECYCLE_TARGET;
use super::engine::{Engine, EngineError, InitContext, StartupContext, StartupTask};
use super::progress::InitProgress;
use super::resources::ResourceRegistry;
use super::state::{LifecycleState, StateHandle};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::telemetry::{LogManager, Logger};

/// Result of a successful [`LifecycleHost::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// `-v` was supplied; nothing was initialised.
    VersionOnly(String),
    /// Both startup phases completed and the host is running.
    Started,
}

/// Errors returned by [`LifecycleHost::start`].
#[derive(Debug, Error)]
pub enum StartError {
    /// `start` was called outside [`LifecycleState::NotStarted`].
    #[error("lifecycle host cannot start from state '{state}'")]
    InvalidState {
        /// State observed when `start` was called.
        state: LifecycleState,
    },
    /// Engine initialisation failed. The host has been disposed.
    #[error("engine initialisation failed: {source}")]
    Initialization {
        /// Error reported by the engine.
        #[source]
        source: EngineError,
    },
    /// Shutdown was requested before startup finished.
    #[error("shutdown requested during startup")]
    ShutdownRequested,
}

/// Tracks whether a `start` call is still inside `block_on`.
#[derive(Debug, Default)]
struct StartupGate {
    active: Mutex<bool>,
    settled: Condvar,
}

impl StartupGate {
    fn open(&self) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    fn settle(&self) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.settled.notify_all();
    }

    fn wait(&self) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        while *active {
            active = self
                .settled
                .wait(active)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Orchestrates initialisation, startup tasks, and disposal of an engine.
///
/// There is one host per process. `start` blocks the calling thread until
/// both startup phases finish; `shutdown` may be called from any other
/// thread and runs the disposal sequence at most once.
pub struct LifecycleHost<E: Engine> {
    engine: E,
    paths: Arc<ApplicationPaths>,
    logger: Logger,
    certificates: CertificatePolicy,
    tasks: Vec<Box<dyn StartupTask>>,
    reporter: Arc<dyn HealthReporter>,
    state: StateHandle,
    progress: InitProgress,
    resources: ResourceRegistry,
    cancel: watch::Sender<bool>,
    gate: StartupGate,
    engaged: AtomicBool,
    disposed: AtomicBool,
}

impl<E: Engine> std::fmt::Debug for LifecycleHost<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHost")
            .field("version", &self.engine.version())
            .field("state", &self.state.current())
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl<E: Engine> LifecycleHost<E> {
    /// Builds a host for `engine`.
    pub fn new(paths: Arc<ApplicationPaths>, logs: &LogManager, engine: E) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            engine,
            paths,
            logger: logs.logger("lifecycle"),
            certificates: CertificatePolicy::strict(),
            tasks: Vec::new(),
            reporter: Arc::new(StructuredHealthReporter::new()),
            state: StateHandle::new(),
            progress: InitProgress::new(),
            resources: ResourceRegistry::new(),
            cancel,
            gate: StartupGate::default(),
            engaged: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    /// Appends a startup task. Tasks run sequentially in insertion order.
    #[must_use]
    pub fn with_startup_task(mut self, task: impl StartupTask + 'static) -> Self {
        self.tasks.push(Box::new(task));
        self
    }

    /// Appends already boxed startup tasks, preserving their order.
    #[must_use]
    pub fn with_startup_tasks(
        mut self,
        tasks: impl IntoIterator<Item = Box<dyn StartupTask>>,
    ) -> Self {
        self.tasks.extend(tasks);
        self
    }

    /// Replaces the health reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn HealthReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Sets the certificate policy handed to the engine.
    #[must_use]
    pub const fn with_certificate_policy(mut self, policy: CertificatePolicy) -> Self {
        self.certificates = policy;
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state.current()
    }

    /// Shared view of the lifecycle state, used by the crash reporter.
    #[must_use]
    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    /// Initialisation progress.
    #[must_use]
    pub const fn progress(&self) -> &InitProgress {
        &self.progress
    }

    /// Registry of resources released at disposal.
    #[must_use]
    pub const fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// Resolved filesystem layout.
    #[must_use]
    pub fn paths(&self) -> &ApplicationPaths {
        self.paths.as_ref()
    }

    /// Engine version.
    #[must_use]
    pub fn version(&self) -> &str {
        self.engine.version()
    }

    /// Runs engine initialisation and then the startup tasks, blocking until
    /// both phases finish.
    ///
    /// `-v` short-circuits with [`StartOutcome::VersionOnly`] and leaves the
    /// host untouched. On initialisation failure the host is disposed before
    /// the error is returned.
    pub fn start(
        &self,
        runtime: &Runtime,
        options: &StartupOptions,
    ) -> Result<StartOutcome, StartError> {
        if options.version_requested() {
            return Ok(StartOutcome::VersionOnly(self.engine.version().to_owned()));
        }

        self.gate.open();
        match self
            .state
            .transition(LifecycleState::NotStarted, LifecycleState::Initializing)
        {
            Ok(()) => {}
            // A shutdown that won the race against `start` already disposed
            // the host.
            Err(LifecycleState::Terminated) if !self.engaged.load(Ordering::Acquire) => {
                self.gate.settle();
                return Err(StartError::ShutdownRequested);
            }
            Err(state) => {
                self.gate.settle();
                return Err(StartError::InvalidState { state });
            }
        }
        self.engaged.store(true, Ordering::Release);

        let outcome = runtime.block_on(self.run_phases());
        match outcome {
            Ok(()) => {
                let promoted = self
                    .state
                    .transition(LifecycleState::Initializing, LifecycleState::Running);
                self.gate.settle();
                if promoted.is_err() {
                    return Err(StartError::ShutdownRequested);
                }
                info!(
                    target: LIFECYCLE_TARGET,
                    parent: self.logger.span(),
                    version = self.engine.version(),
                    "service host running"
                );
                self.reporter.host_running();
                Ok(StartOutcome::Started)
            }
            Err(error @ StartError::Initialization { .. }) => {
                let owns_disposal = self.state.begin_shutdown().is_ok();
                self.gate.settle();
                if owns_disposal {
                    self.reporter.shutdown_started(LifecycleState::Initializing);
                    self.finish_disposal();
                }
                Err(error)
            }
            Err(error) => {
                self.gate.settle();
                Err(error)
            }
        }
    }

    async fn run_phases(&self) -> Result<(), StartError> {
        self.reporter.initialization_started(self.engine.version());
        let init = InitContext {
            progress: &self.progress,
            resources: &self.resources,
            paths: self.paths.as_ref(),
            certificates: self.certificates,
            logger: &self.logger,
        };

        let mut cancelled = self.cancel.subscribe();
        let result = tokio::select! {
            biased;
            _ = cancelled.wait_for(|flag| *flag) => None,
            result = self.engine.init(&init) => Some(result),
        };

        match result {
            None => {
                info!(
                    target: LIFECYCLE_TARGET,
                    parent: self.logger.span(),
                    progress = self.progress.current(),
                    "initialisation cancelled by shutdown"
                );
                return Err(StartError::ShutdownRequested);
            }
            Some(Err(source)) => {
                self.reporter.initialization_failed(&source);
                return Err(StartError::Initialization { source });
            }
            Some(Ok(())) => {}
        }

        self.progress.complete();
        self.reporter.initialization_succeeded();

        // Startup tasks are not cancellable. A shutdown requested from here
        // on is honoured once every task has returned.
        let context = StartupContext {
            state: &self.state,
            progress: &self.progress,
            resources: &self.resources,
            paths: self.paths.as_ref(),
            logger: &self.logger,
        };
        for task in &self.tasks {
            debug!(
                target: LIFECYCLE_TARGET,
                parent: self.logger.span(),
                task = task.name(),
                "running startup task"
            );
            if let Err(error) = task.run(&context).await {
                warn!(
                    target: LIFECYCLE_TARGET,
                    parent: self.logger.span(),
                    task = task.name(),
                    error = %error,
                    "startup task failed"
                );
                self.reporter.startup_task_failed(task.name(), &error);
            }
        }
        Ok(())
    }

    /// Begins shutdown and disposes the host.
    ///
    /// Moves `Initializing` or `Running` to `ShuttingDown`, cancels an
    /// initialisation still in flight, waits for a concurrent `start` to
    /// return, then releases resources. A host that never started moves
    /// straight to `Terminated`. Calls after the first are no-ops.
    /// Must not be called from inside a startup task.
    pub fn shutdown(&self) {
        loop {
            match self.state.begin_shutdown() {
                Ok(previous) => {
                    info!(
                        target: LIFECYCLE_TARGET,
                        parent: self.logger.span(),
                        from = %previous,
                        "shutdown started"
                    );
                    self.reporter.shutdown_started(previous);
                    self.cancel.send_replace(true);
                    self.finish_disposal();
                    return;
                }
                Err(LifecycleState::NotStarted) => {
                    // Losing this exchange means `start` claimed the host
                    // first; retry so the shutdown goes through ShuttingDown.
                    if self
                        .state
                        .transition(LifecycleState::NotStarted, LifecycleState::Terminated)
                        .is_ok()
                    {
                        info!(
                            target: LIFECYCLE_TARGET,
                            parent: self.logger.span(),
                            "shutdown requested before start"
                        );
                        self.finish_disposal();
                        return;
                    }
                }
                Err(state) => {
                    debug!(
                        target: LIFECYCLE_TARGET,
                        parent: self.logger.span(),
                        state = %state,
                        "shutdown already handled"
                    );
                    return;
                }
            }
        }
    }

    /// Releases every resource in reverse acquisition order, then disposes
    /// the engine. Idempotent.
    ///
    /// A host that has not finished its lifecycle is shut down first.
    pub fn dispose(&self) {
        match self.state.current() {
            LifecycleState::NotStarted | LifecycleState::Initializing | LifecycleState::Running => {
                self.shutdown();
            }
            LifecycleState::ShuttingDown | LifecycleState::Terminated => self.finish_disposal(),
        }
    }

    fn finish_disposal(&self) {
        self.gate.wait();
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let released = self.resources.release_all();
        if self.engaged.load(Ordering::Acquire) {
            self.engine.dispose();
        }
        self.state.terminate();
        info!(
            target: LIFECYCLE_TARGET,
            parent: self.logger.span(),
            released,
            "service host disposed"
        );
        self.reporter.host_disposed();
    }
}
