use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use super::SHUTDOWN_TARGET;
use super::session::{SessionEndReason, SessionEvents, SessionRegistration, ShutdownError};
use crate::health::HealthReporter;

type ShutdownAction = Box<dyn FnOnce() + Send>;

/// What caused shutdown to begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownTrigger {
    /// The operating system reported that the session is ending.
    Session(SessionEndReason),
    /// A caller such as a signal handler or the shell asked for shutdown.
    Requested,
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(reason) => write!(f, "session:{reason}"),
            Self::Requested => f.write_str("requested"),
        }
    }
}

struct Inner {
    latch: AtomicBool,
    action: Mutex<Option<ShutdownAction>>,
    completed: Mutex<bool>,
    completion: Condvar,
    reporter: Option<Arc<dyn HealthReporter>>,
}

impl Inner {
    fn trigger(&self, trigger: ShutdownTrigger) -> bool {
        if self
            .latch
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(
                target: SHUTDOWN_TARGET,
                trigger = %trigger,
                "shutdown already requested; trigger absorbed"
            );
            return false;
        }

        info!(target: SHUTDOWN_TARGET, trigger = %trigger, "shutdown triggered");
        if let Some(reporter) = &self.reporter {
            reporter.shutdown_requested(trigger);
        }
        let _completion = CompletionGuard(self);
        let action = self
            .action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(action) = action {
            action();
        }
        true
    }

    fn publish_completion(&self) {
        *self.completed.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.completion.notify_all();
    }
}

/// Publishes completion even when the action unwinds.
struct CompletionGuard<'a>(&'a Inner);

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.0.publish_completion();
    }
}

/// Funnels every shutdown trigger into a single execution of the shutdown
/// action.
///
/// The first trigger wins a compare-and-set latch and runs the action on its
/// own thread; later triggers return immediately. Completion is published
/// separately so callers can block on [`ShutdownCoordinator::wait_completed`].
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("requested", &self.is_requested())
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl ShutdownCoordinator {
    /// Builds a coordinator that runs `action` on the first trigger.
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::build(Box::new(action), None)
    }

    /// Builds a coordinator that also reports the accepted trigger.
    pub fn with_reporter<F>(action: F, reporter: Arc<dyn HealthReporter>) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::build(Box::new(action), Some(reporter))
    }

    fn build(action: ShutdownAction, reporter: Option<Arc<dyn HealthReporter>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                latch: AtomicBool::new(false),
                action: Mutex::new(Some(action)),
                completed: Mutex::new(false),
                completion: Condvar::new(),
                reporter,
            }),
        }
    }

    /// Request-only handle for collaborators.
    #[must_use]
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Requests shutdown. Returns `true` when this call ran the action.
    pub fn request_shutdown(&self) -> bool {
        self.inner.trigger(ShutdownTrigger::Requested)
    }

    /// Handles an operating-system session notification.
    ///
    /// Only [`SessionEndReason::SystemShutdown`] triggers shutdown; other
    /// reasons are ignored. Returns `true` when this call ran the action.
    pub fn on_session_ending(&self, reason: SessionEndReason) -> bool {
        self.handle().session_ending(reason)
    }

    /// Registers the coordinator with a session notification source.
    pub fn register_session_events(
        &self,
        events: &dyn SessionEvents,
    ) -> Result<SessionRegistration, ShutdownError> {
        events.register(self.handle())
    }

    /// Returns `true` once any trigger has been accepted.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.inner.latch.load(Ordering::Acquire)
    }

    /// Returns `true` once the shutdown action has returned.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        *self
            .inner
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the shutdown action has returned.
    pub fn wait_completed(&self) {
        let mut completed = self
            .inner
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while !*completed {
            completed = self
                .inner
                .completion
                .wait(completed)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks until completion or `timeout`. Returns `true` on completion.
    pub fn wait_completed_timeout(&self, timeout: Duration) -> bool {
        let completed = self
            .inner
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (completed, _) = self
            .inner
            .completion
            .wait_timeout_while(completed, timeout, |done| !*done)
            .unwrap_or_else(PoisonError::into_inner);
        *completed
    }
}

/// Cloneable handle that can request shutdown but never dispose directly.
#[derive(Clone)]
pub struct ShutdownHandle {
    inner: Arc<Inner>,
}

impl fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("requested", &self.is_requested())
            .finish()
    }
}

impl ShutdownHandle {
    /// Requests shutdown. Returns `true` when this call ran the action.
    pub fn request_shutdown(&self) -> bool {
        self.inner.trigger(ShutdownTrigger::Requested)
    }

    /// Forwards a session notification, applying the shutdown filter.
    pub fn session_ending(&self, reason: SessionEndReason) -> bool {
        if !reason.triggers_shutdown() {
            info!(
                target: SHUTDOWN_TARGET,
                reason = %reason,
                "session notification ignored"
            );
            return false;
        }
        self.inner.trigger(ShutdownTrigger::Session(reason))
    }

    /// Returns `true` once any trigger has been accepted.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.inner.latch.load(Ordering::Acquire)
    }
}
