//! Production clock

use skywave_ports::Clock;
use std::time::{Duration, Instant};

/// Real clock: monotonic wall time plus process CPU time.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    #[cfg(unix)]
    fn cpu_time(&self) -> Duration {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut ts) };
        if rc == 0 {
            Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
        } else {
            Duration::ZERO
        }
    }

    #[cfg(not(unix))]
    fn cpu_time(&self) -> Duration {
        Duration::ZERO
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}
