//! Scriptable [`Engine`] double that records what the host asked of it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::lifecycle::{Engine, EngineError, InitContext};

/// Shared, ordered log of resource releases and engine disposal.
#[derive(Debug, Clone, Default)]
pub struct ReleaseLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ReleaseLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .expect("release log mutex poisoned")
            .push(entry.into());
    }

    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("release log mutex poisoned")
            .clone()
    }
}

#[derive(Debug, Default)]
struct Script {
    steps: Vec<f64>,
    resources: Vec<String>,
    failure: Option<String>,
    block: bool,
}

#[derive(Debug, Default)]
struct Observed {
    progress: Mutex<Vec<f64>>,
    init_calls: AtomicUsize,
    dispose_calls: AtomicUsize,
    entered: Mutex<bool>,
    entered_signal: Condvar,
}

/// Engine whose initialisation follows a script.
///
/// Clones share their observations, so a scenario can keep one clone while
/// the host owns another.
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    script: Arc<Script>,
    observed: Arc<Observed>,
    releases: ReleaseLog,
}

impl ScriptedEngine {
    /// Reports `steps` in order and succeeds.
    #[must_use]
    pub fn succeeding(steps: &[f64]) -> Self {
        Self::from_script(Script {
            steps: steps.to_vec(),
            ..Script::default()
        })
    }

    /// Reports `steps` in order, then fails with `message`.
    #[must_use]
    pub fn failing(steps: &[f64], message: &str) -> Self {
        Self::from_script(Script {
            steps: steps.to_vec(),
            failure: Some(message.to_owned()),
            ..Script::default()
        })
    }

    /// Reports `steps` in order, then waits until cancelled.
    #[must_use]
    pub fn blocking(steps: &[f64]) -> Self {
        Self::from_script(Script {
            steps: steps.to_vec(),
            block: true,
            ..Script::default()
        })
    }

    fn from_script(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            observed: Arc::new(Observed::default()),
            releases: ReleaseLog::default(),
        }
    }

    /// Registers `names` as resources during initialisation.
    #[must_use]
    pub fn with_resources(self, names: &[&str]) -> Self {
        let script = Script {
            steps: self.script.steps.clone(),
            resources: names.iter().map(|name| (*name).to_owned()).collect(),
            failure: self.script.failure.clone(),
            block: self.script.block,
        };
        Self {
            script: Arc::new(script),
            ..self
        }
    }

    #[must_use]
    pub fn releases(&self) -> ReleaseLog {
        self.releases.clone()
    }

    #[must_use]
    pub fn progress_seen(&self) -> Vec<f64> {
        self.observed
            .progress
            .lock()
            .expect("progress mutex poisoned")
            .clone()
    }

    #[must_use]
    pub fn init_calls(&self) -> usize {
        self.observed.init_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn dispose_calls(&self) -> usize {
        self.observed.dispose_calls.load(Ordering::SeqCst)
    }

    /// Blocks until initialisation has reported every scripted step.
    pub fn wait_until_entered(&self, timeout: Duration) -> bool {
        let entered = self.observed.entered.lock().expect("entered mutex poisoned");
        let (entered, _) = self
            .observed
            .entered_signal
            .wait_timeout_while(entered, timeout, |entered| !*entered)
            .expect("entered mutex poisoned");
        *entered
    }

    fn mark_entered(&self) {
        *self.observed.entered.lock().expect("entered mutex poisoned") = true;
        self.observed.entered_signal.notify_all();
    }
}

impl Engine for ScriptedEngine {
    fn version(&self) -> &str {
        "9.8.7-test"
    }

    async fn init(&self, context: &InitContext<'_>) -> Result<(), EngineError> {
        self.observed.init_calls.fetch_add(1, Ordering::SeqCst);
        for name in &self.script.resources {
            let releases = self.releases.clone();
            let label = name.clone();
            context
                .resources()
                .register(name.clone(), move || releases.push(label));
        }
        for step in &self.script.steps {
            context.progress().report(*step);
            self.observed
                .progress
                .lock()
                .expect("progress mutex poisoned")
                .push(context.progress().current());
            tokio::task::yield_now().await;
        }
        self.mark_entered();
        if self.script.block {
            std::future::pending::<()>().await;
        }
        match &self.script.failure {
            Some(message) => Err(EngineError::new(message.clone())),
            None => Ok(()),
        }
    }

    fn dispose(&self) {
        self.observed.dispose_calls.fetch_add(1, Ordering::SeqCst);
        self.releases.push("engine");
    }
}
