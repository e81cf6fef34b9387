//! Crash capture for faults that escape normal control flow.

mod exit_code;
mod record;
mod reporter;

pub use exit_code::{
    FAULT_EXIT_CODE_MAX, FAULT_EXIT_CODE_MIN, REENTRANT_FAULT_EXIT_CODE, exit_code_for,
};
pub use record::{CrashRecord, Fault, FaultClass, FaultIdentity, FaultLocation};
pub use reporter::{
    CrashHookGuard, CrashOutcome, CrashReporter, DebuggerProbe, ProcStatusProbe,
    ProcessTerminator, Terminator,
};

pub(crate) const CRASH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::crash");
