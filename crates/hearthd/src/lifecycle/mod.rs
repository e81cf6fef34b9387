//! Init, running, and shutdown phases of the service host.

mod engine;
mod host;
mod progress;
mod resources;
mod state;

pub use engine::{Engine, EngineError, InitContext, StartupContext, StartupTask};
pub use host::{LifecycleHost, StartError, StartOutcome};
pub use progress::{InitProgress, PROGRESS_COMPLETE};
pub use resources::ResourceRegistry;
pub use state::{LifecycleState, StateHandle};

pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");
