//! Test harness utilities for the lifecycle behavioural suites.

mod engine;
mod reporter;
mod session;
mod tasks;
mod world;

pub use engine::ScriptedEngine;
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use session::ManualSessionEvents;
pub use tasks::join_spawned;
pub use world::{HostFixture, temp_paths};
