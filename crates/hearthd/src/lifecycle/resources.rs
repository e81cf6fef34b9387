//! Resources acquired during startup and released at disposal.

use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use super::LIFECYCLE_TARGET;

type Release = Box<dyn FnOnce() + Send>;

/// Ordered collection of release actions.
///
/// Actions run in reverse registration order. After [`release_all`] has run
/// the registry is closed and later registrations are released on the spot.
///
/// [`release_all`]: ResourceRegistry::release_all
#[derive(Default)]
pub struct ResourceRegistry {
    inner: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    entries: Vec<(String, Release)>,
    closed: bool,
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ResourceRegistry")
            .field("pending", &inner.entries.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

impl ResourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a release action for the resource called `name`.
    pub fn register<F>(&self, name: impl Into<String>, release: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.closed {
            drop(inner);
            warn!(
                target: LIFECYCLE_TARGET,
                resource = %name,
                "resource registered after disposal; releasing immediately"
            );
            release();
            return;
        }
        debug!(target: LIFECYCLE_TARGET, resource = %name, "resource registered");
        inner.entries.push((name, Box::new(release)));
    }

    /// Number of resources awaiting release.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Returns `true` once [`ResourceRegistry::release_all`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }

    /// Releases every registered resource, newest first, and closes the
    /// registry. Returns the number of resources released.
    pub fn release_all(&self) -> usize {
        let entries = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.closed = true;
            std::mem::take(&mut inner.entries)
        };
        let count = entries.len();
        for (name, release) in entries.into_iter().rev() {
            debug!(target: LIFECYCLE_TARGET, resource = %name, "releasing resource");
            release();
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Release) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared = Arc::clone(&log);
        let make = move |name: &'static str| -> Release {
            let log = Arc::clone(&shared);
            Box::new(move || log.lock().expect("log").push(name))
        };
        (log, make)
    }

    #[test]
    fn releases_in_reverse_order() {
        let (log, make) = recorder();
        let registry = ResourceRegistry::new();
        registry.register("listener", make("listener"));
        registry.register("timer", make("timer"));
        registry.register("cache", make("cache"));

        assert_eq!(registry.release_all(), 3);
        assert_eq!(*log.lock().expect("log"), vec!["cache", "timer", "listener"]);
        assert_eq!(registry.release_all(), 0);
    }

    #[test]
    fn late_registrations_are_released_immediately() {
        let (log, make) = recorder();
        let registry = ResourceRegistry::new();
        registry.release_all();
        registry.register("late", make("late"));
        assert!(registry.is_closed());
        assert_eq!(registry.pending(), 0);
        assert_eq!(*log.lock().expect("log"), vec!["late"]);
    }
}
