//! Operating-system session notifications.

use std::fmt;
use std::io;
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::{info, warn};

use super::SHUTDOWN_TARGET;
use super::coordinator::ShutdownHandle;

/// Why the operating-system session is ending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEndReason {
    /// The machine is shutting down or the service manager is stopping us.
    SystemShutdown,
    /// The interactive user is logging off. The service keeps running.
    Logoff,
}

impl SessionEndReason {
    /// Returns `true` when this reason must stop the host.
    #[must_use]
    pub const fn triggers_shutdown(self) -> bool {
        matches!(self, Self::SystemShutdown)
    }
}

impl fmt::Display for SessionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SystemShutdown => "system_shutdown",
            Self::Logoff => "logoff",
        })
    }
}

/// Errors reported by session notification sources.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Spawning the listener thread failed.
    #[error("failed to spawn signal listener: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Source of session notifications.
pub trait SessionEvents: Send + Sync {
    /// Starts forwarding notifications to `handle` until the returned
    /// registration is unregistered.
    fn register(&self, handle: ShutdownHandle) -> Result<SessionRegistration, ShutdownError>;
}

/// Unregistration handle returned by [`SessionEvents::register`].
///
/// Unregistering twice is harmless; dropping the handle unregisters.
pub struct SessionRegistration {
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl fmt::Debug for SessionRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistration")
            .field("active", &self.unregister.is_some())
            .finish()
    }
}

impl SessionRegistration {
    /// Wraps the action that detaches the listener.
    pub fn new<F>(unregister: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            unregister: Some(Box::new(unregister)),
        }
    }

    /// Detaches the listener.
    pub fn unregister(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl Drop for SessionRegistration {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Maps Unix signals onto session notifications.
///
/// `SIGTERM` is a system shutdown, `SIGHUP` a logoff (ignored by the
/// filter), and `SIGINT` or `SIGQUIT` an explicit request from the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalSessionEvents;

impl SignalSessionEvents {
    /// Builds a signal-backed notification source.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SessionEvents for SignalSessionEvents {
    fn register(&self, handle: ShutdownHandle) -> Result<SessionRegistration, ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGHUP, SIGINT, SIGQUIT])
            .map_err(|source| ShutdownError::Install { source })?;
        let control = signals.handle();
        let listener: JoinHandle<()> = thread::Builder::new()
            .name("hearthd-signals".to_owned())
            .spawn(move || {
                for signal in signals.forever() {
                    info!(target: SHUTDOWN_TARGET, signal, "signal received");
                    match signal {
                        SIGTERM => {
                            handle.session_ending(SessionEndReason::SystemShutdown);
                        }
                        SIGHUP => {
                            handle.session_ending(SessionEndReason::Logoff);
                        }
                        _ => {
                            handle.request_shutdown();
                        }
                    }
                }
            })
            .map_err(|source| ShutdownError::Spawn { source })?;

        Ok(SessionRegistration::new(move || {
            control.close();
            if listener.join().is_err() {
                warn!(target: SHUTDOWN_TARGET, "signal listener panicked");
            }
        }))
    }
}
