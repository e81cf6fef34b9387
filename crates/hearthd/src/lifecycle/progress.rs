use tokio::sync::watch;

/// Upper bound of reported progress.
pub const PROGRESS_COMPLETE: f64 = 100.0;

/// Initialisation progress published by the engine.
///
/// Values are clamped to `[0, 100]` and never decrease; a report lower than
/// the current value, or `NaN`, is ignored. Observers subscribe through
/// [`InitProgress::subscribe`].
#[derive(Debug)]
pub struct InitProgress {
    sender: watch::Sender<f64>,
}

impl Default for InitProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl InitProgress {
    /// Creates a tracker at zero.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0.0);
        Self { sender }
    }

    /// Reports a new value. Returns `true` when the published value changed.
    pub fn report(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        let clamped = value.clamp(0.0, PROGRESS_COMPLETE);
        self.sender.send_if_modified(|current| {
            if clamped > *current {
                *current = clamped;
                true
            } else {
                false
            }
        })
    }

    /// Last published value.
    #[must_use]
    pub fn current(&self) -> f64 {
        *self.sender.borrow()
    }

    /// Returns `true` once progress reached 100.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current() >= PROGRESS_COMPLETE
    }

    /// Subscribes to progress updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.sender.subscribe()
    }

    pub(crate) fn complete(&self) {
        self.report(PROGRESS_COMPLETE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[10.0, 5.0, 40.0], 40.0)]
    #[case(&[-3.0, 20.0], 20.0)]
    #[case(&[60.0, 250.0, 70.0], 100.0)]
    #[case(&[30.0, f64::NAN], 30.0)]
    fn reports_never_decrease(#[case] reports: &[f64], #[case] expected: f64) {
        let progress = InitProgress::new();
        let mut last = progress.current();
        for value in reports {
            progress.report(*value);
            assert!(progress.current() >= last);
            assert!((0.0..=PROGRESS_COMPLETE).contains(&progress.current()));
            last = progress.current();
        }
        assert!((progress.current() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn subscribers_see_the_latest_value() {
        let progress = InitProgress::new();
        let receiver = progress.subscribe();
        progress.report(35.0);
        progress.complete();
        assert!((*receiver.borrow() - PROGRESS_COMPLETE).abs() < f64::EPSILON);
        assert!(progress.is_complete());
    }
}
