//! Placeholder engine used until a real service engine is linked in.

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;

use crate::lifecycle::{Engine, EngineError, InitContext, StartupContext, StartupTask};

const ENGINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::engine::idle");
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);
const INIT_STEPS: [f64; 3] = [25.0, 50.0, 75.0];

/// Engine that initialises nothing and reports progress in fixed steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleEngine;

impl Engine for IdleEngine {
    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn init(&self, context: &InitContext<'_>) -> Result<(), EngineError> {
        tracing::warn!(
            target: ENGINE_TARGET,
            parent: context.logger().span(),
            certificates_relaxed = context.certificates().is_relaxed(),
            "no service engine linked; running idle"
        );
        for step in INIT_STEPS {
            context.progress().report(step);
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    fn dispose(&self) {
        tracing::debug!(target: ENGINE_TARGET, "idle engine disposed");
    }
}

/// Startup task that logs a heartbeat until the host is disposed.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatTask {
    interval: Duration,
}

impl Default for HeartbeatTask {
    fn default() -> Self {
        Self::new(HEARTBEAT_INTERVAL)
    }
}

impl HeartbeatTask {
    /// Builds a heartbeat with the given period.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl StartupTask for HeartbeatTask {
    fn name(&self) -> &str {
        "heartbeat"
    }

    fn run<'a>(&'a self, context: &'a StartupContext<'a>) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            let interval = self.interval;
            let span = context.logger().span().clone();
            let heartbeat: JoinHandle<()> = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    tracing::debug!(target: ENGINE_TARGET, parent: &span, "heartbeat");
                }
            });
            context
                .resources()
                .register("heartbeat", move || heartbeat.abort());
            Ok(())
        })
    }
}
