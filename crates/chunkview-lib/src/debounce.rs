use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug)]
struct Pending<T> {
    due: Instant,
    value: T,
}

/// Holds back the latest value until no newer one arrived for `delay`.
///
/// Scheduling a value cancels the one before it. The caller drives time by
/// passing `now`, which keeps the debouncer usable from any event loop.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<Pending<T>>,
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns true when an earlier value was superseded.
    pub fn schedule(&mut self, value: T, now: Instant) -> bool {
        let superseded = self.pending.is_some();
        self.pending = Some(Pending {
            due: now + self.delay,
            value,
        });
        superseded
    }

    /// Release the pending value once its quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some(pending) if pending.due <= now => self.pending.take().map(|p| p.value),
            _ => None,
        }
    }

    /// Release the pending value immediately.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|pending| pending.value)
    }

    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn due(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_after_quiet_period() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        debouncer.schedule(1, start);
        assert_eq!(debouncer.poll(start + Duration::from_millis(299)), None);
        assert_eq!(debouncer.poll(start + Duration::from_millis(300)), Some(1));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn rapid_changes_coalesce_to_last() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        assert!(!debouncer.schedule("a", start));
        assert!(debouncer.schedule("b", start + Duration::from_millis(100)));
        assert!(debouncer.schedule("c", start + Duration::from_millis(200)));
        assert_eq!(debouncer.poll(start + Duration::from_millis(400)), None);
        assert_eq!(debouncer.poll(start + Duration::from_millis(500)), Some("c"));
        assert_eq!(debouncer.poll(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn flush_and_cancel() {
        let now = Instant::now();
        let mut debouncer = Debouncer::default();
        debouncer.schedule(7, now);
        assert_eq!(debouncer.flush(), Some(7));
        debouncer.schedule(8, now);
        assert!(debouncer.cancel());
        assert_eq!(debouncer.flush(), None);
    }
}
