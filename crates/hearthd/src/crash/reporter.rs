use std::fs::OpenOptions;
use std::io::{self, Write};
use std::panic;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use signal_hook::SigId;
use signal_hook::consts::signal::SIGABRT;
use signal_hook::low_level;
use tracing::{error, warn};

use super::CRASH_TARGET;
use super::exit_code::{REENTRANT_FAULT_EXIT_CODE, exit_code_for};
use super::record::{CrashRecord, Fault};
use crate::environment::EnvironmentSnapshot;
use crate::lifecycle::StateHandle;
use crate::telemetry::{LogManager, Logger};

/// Detects an attached interactive debugger.
pub trait DebuggerProbe: Send + Sync {
    /// Returns `true` when a debugger is attached.
    fn is_attached(&self) -> bool;
}

impl<T> DebuggerProbe for Arc<T>
where
    T: DebuggerProbe + ?Sized,
{
    fn is_attached(&self) -> bool {
        (**self).is_attached()
    }
}

/// Reads `TracerPid` from `/proc/self/status` on Linux.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcStatusProbe;

impl DebuggerProbe for ProcStatusProbe {
    #[cfg(target_os = "linux")]
    fn is_attached(&self) -> bool {
        std::fs::read_to_string("/proc/self/status")
            .map(|status| tracer_attached(&status))
            .unwrap_or(false)
    }

    #[cfg(not(target_os = "linux"))]
    fn is_attached(&self) -> bool {
        false
    }
}

fn tracer_attached(status: &str) -> bool {
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|value| value.trim().parse::<u32>().ok())
        .is_some_and(|pid| pid != 0)
}

/// Ends the process.
pub trait Terminator: Send + Sync {
    /// Terminates with `code`. Production implementations do not return.
    fn terminate(&self, code: u8);
}

impl<T> Terminator for Arc<T>
where
    T: Terminator + ?Sized,
{
    fn terminate(&self, code: u8) {
        (**self).terminate(code);
    }
}

/// Terminates through [`std::process::exit`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTerminator;

impl Terminator for ProcessTerminator {
    fn terminate(&self, code: u8) {
        std::process::exit(i32::from(code));
    }
}

/// What [`CrashReporter::report`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrashOutcome {
    /// The record was written and termination was requested.
    Terminated {
        /// Exit code handed to the terminator.
        exit_code: u8,
        /// Persisted record, if writing succeeded.
        record: Option<Utf8PathBuf>,
    },
    /// A debugger is attached; the process keeps running.
    DebuggerAttached {
        /// Exit code the fault would have produced.
        exit_code: u8,
        /// Persisted record, if writing succeeded.
        record: Option<Utf8PathBuf>,
    },
    /// A fault arrived while another was being handled.
    Reentrant,
}

/// Last-resort handler for uncaught faults.
///
/// Each report persists one [`CrashRecord`] as a JSON file in the log
/// directory, forces the lifecycle state to terminated, and terminates with
/// an exit code derived from the fault. A report that starts while another
/// is in progress terminates with [`REENTRANT_FAULT_EXIT_CODE`] without
/// writing anything.
pub struct CrashReporter {
    log_dir: Utf8PathBuf,
    environment: EnvironmentSnapshot,
    logger: Logger,
    probe: Box<dyn DebuggerProbe>,
    terminator: Box<dyn Terminator>,
    lifecycle: Option<StateHandle>,
    handling: Arc<AtomicBool>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for CrashReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashReporter")
            .field("log_dir", &self.log_dir)
            .field("handling", &self.handling.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl CrashReporter {
    /// Builds a reporter writing into the manager's log directory.
    #[must_use]
    pub fn new(logs: &LogManager, environment: EnvironmentSnapshot) -> Self {
        Self::with_log_dir(logs.log_dir(), logs.logger("crash"), environment)
    }

    /// Builds a reporter writing into `log_dir`.
    #[must_use]
    pub fn with_log_dir(log_dir: &Utf8Path, logger: Logger, environment: EnvironmentSnapshot) -> Self {
        Self {
            log_dir: log_dir.to_owned(),
            environment,
            logger,
            probe: Box::new(ProcStatusProbe),
            terminator: Box::new(ProcessTerminator),
            lifecycle: None,
            handling: Arc::new(AtomicBool::new(false)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Replaces the debugger probe.
    #[must_use]
    pub fn with_debugger_probe(mut self, probe: impl DebuggerProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// Replaces the terminator.
    #[must_use]
    pub fn with_terminator(mut self, terminator: impl Terminator + 'static) -> Self {
        self.terminator = Box::new(terminator);
        self
    }

    /// Forces `state` to terminated whenever a fault is reported.
    #[must_use]
    pub fn with_lifecycle(mut self, state: StateHandle) -> Self {
        self.lifecycle = Some(state);
        self
    }

    /// Handles a fault.
    pub fn report(&self, fault: &Fault) -> CrashOutcome {
        if self.handling.swap(true, Ordering::AcqRel) {
            self.terminator.terminate(REENTRANT_FAULT_EXIT_CODE);
            return CrashOutcome::Reentrant;
        }

        let identity = fault.identity();
        let exit_code = exit_code_for(&identity);
        let record = CrashRecord::capture(fault, exit_code, self.environment.clone());
        let persisted = match self.persist(&record) {
            Ok(path) => Some(path),
            Err(source) => {
                warn!(
                    target: CRASH_TARGET,
                    parent: self.logger.span(),
                    error = %source,
                    "failed to persist crash record"
                );
                None
            }
        };
        error!(
            target: CRASH_TARGET,
            parent: self.logger.span(),
            fault = %identity.canonical(),
            message = fault.description(),
            exit_code,
            record = ?persisted,
            "uncaught fault"
        );

        if let Some(state) = &self.lifecycle {
            state.terminate();
        }

        if self.probe.is_attached() {
            warn!(
                target: CRASH_TARGET,
                parent: self.logger.span(),
                "debugger attached; not terminating"
            );
            self.handling.store(false, Ordering::Release);
            return CrashOutcome::DebuggerAttached {
                exit_code,
                record: persisted,
            };
        }

        self.terminator.terminate(exit_code);
        CrashOutcome::Terminated {
            exit_code,
            record: persisted,
        }
    }

    fn persist(&self, record: &CrashRecord) -> io::Result<Utf8PathBuf> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or(0);
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel);
        let path = self.log_dir.join(format!(
            "crash-{millis}-{}-{sequence}.json",
            std::process::id()
        ));

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path.as_std_path())?;
        serde_json::to_writer_pretty(&mut file, record)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(path)
    }

    /// Installs the reporter as the process panic hook.
    ///
    /// A panic raised inside the hook makes the runtime abort instead of
    /// running the hook again, so an abort observed while a fault is being
    /// handled exits with [`REENTRANT_FAULT_EXIT_CODE`]. The previous hook is
    /// restored and the abort handler removed when the guard is dropped.
    #[must_use]
    pub fn install(self: Arc<Self>) -> CrashHookGuard {
        let abort_exit = self.arm_reentry_exit();
        let previous = Arc::new(panic::take_hook());
        let fallback = Arc::clone(&previous);
        panic::set_hook(Box::new(move |info| {
            let fault = Fault::from_panic(info);
            if let CrashOutcome::DebuggerAttached { .. } = self.report(&fault) {
                fallback(info);
            }
        }));
        CrashHookGuard {
            previous: Some(previous),
            abort_exit,
        }
    }

    fn arm_reentry_exit(&self) -> Option<SigId> {
        let handling = Arc::clone(&self.handling);
        let action = move || {
            if handling.load(Ordering::Acquire) {
                low_level::exit(i32::from(REENTRANT_FAULT_EXIT_CODE));
            }
        };
        // SAFETY: the action performs an atomic load and `_exit`, both of
        // which are async-signal-safe.
        match unsafe { low_level::register(SIGABRT, action) } {
            Ok(id) => Some(id),
            Err(source) => {
                warn!(
                    target: CRASH_TARGET,
                    parent: self.logger.span(),
                    error = %source,
                    "failed to arm the re-entrant fault exit"
                );
                None
            }
        }
    }
}

type PanicHook = Box<dyn Fn(&panic::PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Unregistration handle for the crash hook.
pub struct CrashHookGuard {
    previous: Option<Arc<PanicHook>>,
    abort_exit: Option<SigId>,
}

impl std::fmt::Debug for CrashHookGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashHookGuard")
            .field("installed", &self.previous.is_some())
            .finish()
    }
}

impl CrashHookGuard {
    /// Restores the previous panic hook.
    pub fn uninstall(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if let Some(id) = self.abort_exit.take() {
            low_level::unregister(id);
        }
        if let Some(previous) = self.previous.take() {
            drop(panic::take_hook());
            panic::set_hook(Box::new(move |info| previous(info)));
        }
    }
}

impl Drop for CrashHookGuard {
    fn drop(&mut self) {
        self.restore();
    }
}
