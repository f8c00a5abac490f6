//! Skywave Ports
//!
//! Port definitions (traits) for the Skywave radio stack.
//! These define the boundaries between the control plane and the
//! infrastructure it drives: signal sources, the topology engine that owns
//! the concrete DSP nodes, time, and the orchestrator capability handed to
//! receivers.

mod clock;
mod graph;
mod hook;
mod mode;
mod source;

pub use clock::Clock;
pub use graph::{
    AudioFrame, DemodKind, DemodSpec, Endpoint, GraphError, NodeId, SpectrumFrame,
    SpectrumParams, TopologyEngine,
};
pub use hook::ControlHook;
pub use mode::Mode;
pub use source::{Source, TuneHook};
