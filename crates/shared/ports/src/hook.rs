use crate::Mode;

/// Scoped capability handed to a receiver at construction, letting it
/// request orchestrator actions on itself.
///
/// The handle starts disabled; every call is a silent no-op until the
/// orchestrator enables it after construction and initial state
/// application finish. This keeps self-referential requests triggered by
/// initialization from reentering an inconsistent orchestrator.
pub trait ControlHook {
    /// Recompute this receiver's validity; reconnect if it changed.
    fn revalidate(&self);

    /// Rebuild this receiver in place under its current mode.
    fn rebuild(&self);

    /// Rebuild this receiver in place under a different mode.
    fn replace(&self, mode: Mode);
}
