use std::time::Duration;

/// Port for time abstraction
///
/// This allows the control plane to use different time sources:
/// - Real system time for production
/// - Manually advanced time for deterministic tests
pub trait Clock {
    /// Monotonic wall-clock reading since an arbitrary fixed epoch.
    fn now(&self) -> Duration;

    /// Cumulative CPU time consumed by the process.
    fn cpu_time(&self) -> Duration;

    /// Get the clock's name/identifier for debugging
    fn name(&self) -> &str {
        "Clock"
    }
}
