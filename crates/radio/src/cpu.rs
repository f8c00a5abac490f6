//! Rate-limited CPU-use sampling

use skywave_ports::Clock;
use std::time::Duration;

/// Minimum wall-clock interval between two CPU samples.
const SAMPLE_WINDOW: Duration = Duration::from_millis(500);

/// Process-CPU-over-wall-time ratio, resampled at most twice a second.
#[derive(Debug)]
pub struct CpuMonitor {
    last_wall: Duration,
    last_cpu: Duration,
    last_ratio: f64,
}

impl CpuMonitor {
    pub fn new(clock: &dyn Clock) -> Self {
        CpuMonitor {
            last_wall: clock.now(),
            last_cpu: clock.cpu_time(),
            last_ratio: 0.0,
        }
    }

    /// The current ratio, rounded to two decimals. Inside the sample
    /// window the previous reading is returned unchanged.
    pub fn sample(&mut self, clock: &dyn Clock) -> f64 {
        let wall = clock.now();
        let elapsed = wall.saturating_sub(self.last_wall);
        if elapsed >= SAMPLE_WINDOW {
            let cpu = clock.cpu_time();
            let used = cpu.saturating_sub(self.last_cpu);
            self.last_wall = wall;
            self.last_cpu = cpu;
            self.last_ratio = (used.as_secs_f64() / elapsed.as_secs_f64() * 100.0).round() / 100.0;
        }
        self.last_ratio
    }
}
