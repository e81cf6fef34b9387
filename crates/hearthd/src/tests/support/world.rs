//! Shared fixtures: temporary program data, telemetry, and a wired host.

use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use tempfile::TempDir;
use tokio::runtime::Runtime;

use hearth_config::{ApplicationPaths, Config};

use crate::lifecycle::LifecycleHost;
use crate::telemetry::{self, LogManager};

use super::engine::ScriptedEngine;
use super::reporter::RecordingHealthReporter;
use super::tasks::{RecordingTask, TaskObservation};

/// Prepared paths rooted in a fresh temporary directory.
pub fn temp_paths() -> (TempDir, ApplicationPaths) {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().join("programdata")).expect("utf8 temp path");
    let paths = ApplicationPaths::rooted_at("/opt/hearth/hearthd", root);
    paths.prepare().expect("prepare program data");
    (dir, paths)
}

/// Multi-threaded runtime equivalent to the production one.
pub fn build_runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("tokio runtime")
}

/// A host over a [`ScriptedEngine`] with recording collaborators.
pub struct HostFixture {
    _dir: TempDir,
    pub paths: Arc<ApplicationPaths>,
    pub logs: LogManager,
    pub engine: ScriptedEngine,
    pub reporter: Arc<RecordingHealthReporter>,
    pub journal: Arc<Mutex<Vec<TaskObservation>>>,
    pub runtime: Runtime,
    pending_tasks: Vec<RecordingTask>,
}

impl HostFixture {
    #[must_use]
    pub fn new(engine: ScriptedEngine) -> Self {
        let (dir, paths) = temp_paths();
        let logs = telemetry::initialise(&paths, &Config::default()).expect("telemetry");
        Self {
            _dir: dir,
            paths: Arc::new(paths),
            logs,
            engine,
            reporter: Arc::new(RecordingHealthReporter::default()),
            journal: Arc::new(Mutex::new(Vec::new())),
            runtime: build_runtime(),
            pending_tasks: Vec::new(),
        }
    }

    /// Queues a task for the host built by [`HostFixture::build`].
    pub fn add_task(&mut self, task: RecordingTask) {
        self.pending_tasks.push(task);
    }

    /// Builds a task that records into this fixture's journal.
    #[must_use]
    pub fn task(&self, name: &str) -> RecordingTask {
        RecordingTask::new(name, &self.journal)
    }

    /// Builds the host, moving queued tasks into it.
    pub fn build(&mut self) -> Arc<LifecycleHost<ScriptedEngine>> {
        let tasks = self.pending_tasks.drain(..);
        let host = tasks.fold(
            LifecycleHost::new(Arc::clone(&self.paths), &self.logs, self.engine.clone())
                .with_reporter(self.reporter.clone()),
            |host, task| host.with_startup_task(task),
        );
        Arc::new(host)
    }

    #[must_use]
    pub fn observations(&self) -> Vec<TaskObservation> {
        self.journal.lock().expect("journal mutex poisoned").clone()
    }
}
