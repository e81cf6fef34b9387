//! Test suites for the service host lifecycle.

mod crash_behaviour;
mod support;
