//! Process supervision: runtime files, launch sequencing, and exit codes.

mod errors;
mod files;
mod guard;
pub(crate) mod launch;

pub use errors::{EXIT_CONFIGURATION, EXIT_SOFTWARE, LaunchError};
pub use launch::{LaunchOutcome, run_service};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
