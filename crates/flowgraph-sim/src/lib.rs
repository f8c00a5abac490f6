//! Flowgraph Sim
//!
//! Simulated backend for the Skywave control plane:
//!
//! - **SimGraph**: a `TopologyEngine` that book-keeps nodes and edges
//!   instead of running DSP, records control operations, and can inject
//!   connect failures
//! - **SimSource**: a tunable, renewable `Source` with a configurable
//!   settling delay
//! - **SimClock**: manually advanced wall and CPU time
//!
//! Everything hands out cheap clonable handles over shared state so tests
//! keep inspection access after moving the objects into the orchestrator.

pub mod clock;
pub mod graph;
pub mod source;

// Re-export main types
pub use clock::SimClock;
pub use graph::{SimGraph, SimNodeKind};
pub use source::{SimSource, SimSourceHandle};
