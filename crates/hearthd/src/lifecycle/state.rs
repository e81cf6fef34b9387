//! Lifecycle state and its guarded transitions.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Phase of the service host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    /// `start` has not been called.
    NotStarted = 0,
    /// Engine initialisation or startup tasks are running.
    Initializing = 1,
    /// Startup completed.
    Running = 2,
    /// Shutdown has begun; disposal is pending.
    ShuttingDown = 3,
    /// Disposal completed or a fault forced termination.
    Terminated = 4,
}

impl LifecycleState {
    /// Lower-case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Terminated => "terminated",
        }
    }

    const fn from_repr(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Initializing,
            2 => Self::Running,
            3 => Self::ShuttingDown,
            _ => Self::Terminated,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared view of the host's lifecycle state.
///
/// Every transition is a single compare-exchange, so concurrent callers agree
/// on which of them performed it. Only the crash path may skip phases.
#[derive(Debug, Clone)]
pub struct StateHandle {
    cell: Arc<AtomicU8>,
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StateHandle {
    /// Creates a handle in [`LifecycleState::NotStarted`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            cell: Arc::new(AtomicU8::new(LifecycleState::NotStarted as u8)),
        }
    }

    /// Current state.
    #[must_use]
    pub fn current(&self) -> LifecycleState {
        LifecycleState::from_repr(self.cell.load(Ordering::Acquire))
    }

    /// Moves from `from` to `to`, returning the observed state on mismatch.
    pub(crate) fn transition(
        &self,
        from: LifecycleState,
        to: LifecycleState,
    ) -> Result<(), LifecycleState> {
        self.cell
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(LifecycleState::from_repr)
    }

    /// Moves `Initializing` or `Running` to `ShuttingDown`.
    ///
    /// Returns the state that was left, or the observed state when no
    /// transition was possible.
    pub(crate) fn begin_shutdown(&self) -> Result<LifecycleState, LifecycleState> {
        let mut observed = self.current();
        loop {
            match observed {
                LifecycleState::Initializing | LifecycleState::Running => {
                    match self.transition(observed, LifecycleState::ShuttingDown) {
                        Ok(()) => return Ok(observed),
                        Err(actual) => observed = actual,
                    }
                }
                other => return Err(other),
            }
        }
    }

    /// Forces [`LifecycleState::Terminated`], returning the previous state.
    pub(crate) fn terminate(&self) -> LifecycleState {
        LifecycleState::from_repr(
            self.cell
                .swap(LifecycleState::Terminated as u8, Ordering::AcqRel),
        )
    }
}
