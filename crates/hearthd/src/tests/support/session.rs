//! Session notification source driven by the test.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::shutdown::{
    SessionEndReason, SessionEvents, SessionRegistration, ShutdownError, ShutdownHandle,
};

#[derive(Debug, Default)]
struct Shared {
    handle: Mutex<Option<ShutdownHandle>>,
    registrations: AtomicUsize,
    unregistrations: AtomicUsize,
    on_register: Option<SessionEndReason>,
}

/// [`SessionEvents`] implementation whose notifications are fired by hand.
#[derive(Debug, Clone, Default)]
pub struct ManualSessionEvents {
    shared: Arc<Shared>,
}

impl ManualSessionEvents {
    /// Delivers `reason` from inside `register`, before the caller has
    /// regained control.
    #[must_use]
    pub fn ending_on_register(reason: SessionEndReason) -> Self {
        Self {
            shared: Arc::new(Shared {
                on_register: Some(reason),
                ..Shared::default()
            }),
        }
    }

    /// Delivers a session-ending notification. Returns `true` when it ran
    /// the shutdown action; `false` when absorbed or nothing is registered.
    pub fn fire(&self, reason: SessionEndReason) -> bool {
        let handle = self
            .shared
            .handle
            .lock()
            .expect("session mutex poisoned")
            .clone();
        handle.is_some_and(|handle| handle.session_ending(reason))
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.shared
            .handle
            .lock()
            .expect("session mutex poisoned")
            .is_some()
    }

    /// Blocks until a registration exists or `attempts` polls have passed.
    pub fn wait_registered(&self, attempts: usize) -> bool {
        for _ in 0..attempts {
            if self.is_registered() {
                return true;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        self.is_registered()
    }

    #[must_use]
    pub fn registrations(&self) -> usize {
        self.shared.registrations.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn unregistrations(&self) -> usize {
        self.shared.unregistrations.load(Ordering::SeqCst)
    }
}

impl SessionEvents for ManualSessionEvents {
    fn register(&self, handle: ShutdownHandle) -> Result<SessionRegistration, ShutdownError> {
        *self.shared.handle.lock().expect("session mutex poisoned") = Some(handle.clone());
        self.shared.registrations.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.shared.on_register {
            handle.session_ending(reason);
        }
        let shared = Arc::clone(&self.shared);
        Ok(SessionRegistration::new(move || {
            shared.handle.lock().expect("session mutex poisoned").take();
            shared.unregistrations.fetch_add(1, Ordering::SeqCst);
        }))
    }
}
