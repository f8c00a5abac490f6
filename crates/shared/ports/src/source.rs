use crate::NodeId;
use skywave_state::ExportedState;
use std::time::Duration;

/// Hook a source invokes whenever it is retuned.
pub type TuneHook = Box<dyn Fn()>;

/// Port to a signal source (hardware frontend, file, test source).
///
/// Sources carry their own state tree; the orchestrator reads the handful
/// of values below and otherwise treats them as opaque children of its
/// `sources` collection.
pub trait Source: ExportedState {
    /// This source's stream node in the topology.
    fn node(&self) -> NodeId;

    /// Human-readable label, used for the source-selection enumeration.
    fn label(&self) -> String;

    fn sample_rate(&self) -> f64;

    /// Current center frequency.
    fn frequency(&self) -> f64;

    /// How long after a retune the hardware takes to settle.
    fn tune_settling_delay(&self) -> Duration;

    /// Replace the hook invoked on every retune.
    fn set_tune_hook(&mut self, hook: TuneHook);

    /// Whether the live object can be reused for the next rewire.
    fn needs_renew(&self) -> bool;

    /// A fresh instance carrying this source's configuration, replacing
    /// it under the same key.
    fn renew(&self) -> Box<dyn Source>;
}
