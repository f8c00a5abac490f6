//! Manually advanced clock

use skywave_ports::Clock;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Default)]
struct ClockInner {
    now: Duration,
    cpu: Duration,
}

/// Clock whose wall and CPU time only move when a test says so.
#[derive(Clone, Default)]
pub struct SimClock {
    inner: Rc<RefCell<ClockInner>>,
}

impl SimClock {
    pub fn new() -> Self {
        SimClock::default()
    }

    /// Advance wall time.
    pub fn advance(&self, delta: Duration) {
        self.inner.borrow_mut().now += delta;
    }

    /// Account CPU time to the simulated process.
    pub fn burn_cpu(&self, delta: Duration) {
        self.inner.borrow_mut().cpu += delta;
    }
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    fn cpu_time(&self) -> Duration {
        self.inner.borrow().cpu
    }

    fn name(&self) -> &str {
        "SimClock"
    }
}
