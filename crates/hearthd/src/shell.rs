//! Foreground capability handed control once the host is running.
//!
//! A shell owns the foreground loop. It may request shutdown through its
//! [`ShutdownHandle`] but never disposes the host itself; the coordinator
//! calls [`HostShell::terminate`] once shutdown has run.

use std::sync::{Condvar, Mutex, PoisonError};

use ortho_config::Localizer;
use thiserror::Error;
use tracing::info;

use hearth_config::Config;

use crate::localizer::{self, messages};
use crate::shutdown::ShutdownHandle;
use crate::telemetry::Logger;

const SHELL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::shell");

/// Shell variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    /// No user interface; blocks until terminated.
    Headless,
    /// A native desktop shell with its own event loop.
    Native,
}

/// Errors reported by a shell's event loop.
#[derive(Debug, Error)]
pub enum ShellError {
    /// The event loop failed.
    #[error("host shell failed: {message}")]
    EventLoop {
        /// Description of the failure.
        message: String,
    },
}

/// References handed to the shell after startup.
#[derive(Clone, Copy)]
pub struct ShellContext<'a> {
    shutdown: &'a ShutdownHandle,
    logger: &'a Logger,
    config: &'a Config,
    localizer: &'a dyn Localizer,
}

impl std::fmt::Debug for ShellContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellContext")
            .field("logger", &self.logger.name())
            .finish_non_exhaustive()
    }
}

impl<'a> ShellContext<'a> {
    /// Bundles the shell's collaborators.
    #[must_use]
    pub const fn new(
        shutdown: &'a ShutdownHandle,
        logger: &'a Logger,
        config: &'a Config,
        localizer: &'a dyn Localizer,
    ) -> Self {
        Self {
            shutdown,
            logger,
            config,
            localizer,
        }
    }

    /// Handle for requesting shutdown on user-initiated quit.
    #[must_use]
    pub const fn shutdown(&self) -> &ShutdownHandle {
        self.shutdown
    }

    /// Active logger.
    #[must_use]
    pub const fn logger(&self) -> &Logger {
        self.logger
    }

    /// Resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        self.config
    }

    /// Localization provider.
    #[must_use]
    pub const fn localizer(&self) -> &dyn Localizer {
        self.localizer
    }
}

/// Foreground capability.
pub trait HostShell: Send + Sync {
    /// Variant of this shell.
    fn kind(&self) -> ShellKind;

    /// Runs the foreground loop until the shell is terminated.
    fn run(&self, context: ShellContext<'_>) -> Result<(), ShellError>;

    /// Ends the foreground loop. Called by the shutdown path; idempotent.
    fn terminate(&self);
}

/// Shell for the headless service: parks the foreground thread until
/// terminated.
#[derive(Debug, Default)]
pub struct HeadlessShell {
    terminated: Mutex<bool>,
    wake: Condvar,
}

impl HeadlessShell {
    /// Builds a headless shell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once [`HostShell::terminate`] has been called.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        *self.terminated.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HostShell for HeadlessShell {
    fn kind(&self) -> ShellKind {
        ShellKind::Headless
    }

    fn run(&self, context: ShellContext<'_>) -> Result<(), ShellError> {
        info!(
            target: SHELL_TARGET,
            parent: context.logger().span(),
            "{}",
            localizer::message(context.localizer(), &messages::HEADLESS_RUNNING)
        );
        let mut terminated = self.terminated.lock().unwrap_or_else(PoisonError::into_inner);
        while !*terminated {
            terminated = self
                .wake
                .wait(terminated)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(terminated);
        info!(
            target: SHELL_TARGET,
            parent: context.logger().span(),
            "{}",
            localizer::message(context.localizer(), &messages::HEADLESS_STOPPING)
        );
        Ok(())
    }

    fn terminate(&self) {
        *self.terminated.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.wake.notify_all();
    }
}
