//! Single-execution shutdown path shared by signals, session notifications,
//! and the host shell.

mod coordinator;
mod session;

pub use coordinator::{ShutdownCoordinator, ShutdownHandle, ShutdownTrigger};
pub use session::{
    SessionEndReason, SessionEvents, SessionRegistration, ShutdownError, SignalSessionEvents,
};

pub(crate) const SHUTDOWN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::shutdown");
