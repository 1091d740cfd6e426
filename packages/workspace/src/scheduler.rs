//! # Explicit timers
//!
//! Instant-addressed, cancellable timers for the sync state machine. No
//! ambient clocks: callers pass `Instant`s in, so tests drive a virtual
//! clock deterministically and the binary maps deadlines onto `tokio::time`.

use std::time::{Duration, Instant};

/// Single-shot coalescing timer for debounced autosave.
///
/// Re-arming supersedes a pending (not yet fired) deadline, so a second
/// edit pushes the save out rather than scheduling a second one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Start (or restart) the timer from `now`.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True exactly once per armed deadline, as soon as `now` reaches it.
    /// Firing disarms the timer.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Fixed-cadence timer for the background remote probe.
#[derive(Debug, Clone)]
pub struct ProbeTimer {
    period: Duration,
    next: Option<Instant>,
}

impl ProbeTimer {
    pub fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    /// True once per elapsed period. The first poll only schedules.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next {
            None => {
                self.next = Some(now + self.period);
                false
            }
            Some(next) if now >= next => {
                self.next = Some(now + self.period);
                true
            }
            Some(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debouncer_fires_once_after_delay() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(1000));

        assert!(!debouncer.fire(start));

        debouncer.arm(start);
        assert!(!debouncer.fire(start + Duration::from_millis(500)));
        assert!(debouncer.fire(start + Duration::from_millis(1000)));
        // disarmed after firing
        assert!(!debouncer.fire(start + Duration::from_millis(2000)));
    }

    #[test]
    fn rearming_supersedes_the_pending_deadline() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(1000));

        debouncer.arm(start);
        debouncer.arm(start + Duration::from_millis(600));

        // Old deadline has passed, new one has not.
        assert!(!debouncer.fire(start + Duration::from_millis(1100)));
        assert!(debouncer.fire(start + Duration::from_millis(1600)));
    }

    #[test]
    fn cancel_disarms() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(1000));

        debouncer.arm(start);
        debouncer.cancel();
        assert!(!debouncer.is_armed());
        assert!(!debouncer.fire(start + Duration::from_millis(2000)));
    }

    #[test]
    fn probe_timer_ticks_on_a_cadence() {
        let start = Instant::now();
        let mut timer = ProbeTimer::new(Duration::from_millis(1000));

        assert!(!timer.poll(start));
        assert!(!timer.poll(start + Duration::from_millis(900)));
        assert!(timer.poll(start + Duration::from_millis(1000)));
        assert!(!timer.poll(start + Duration::from_millis(1500)));
        assert!(timer.poll(start + Duration::from_millis(2100)));
    }
}
