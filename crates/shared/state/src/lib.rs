//! Skywave State - Reflective State Tree
//!
//! Every configurable entity in the radio stack exposes its state through
//! this crate's `ExportedState` contract:
//!
//! - **Cells**: named, typed properties with a constraint descriptor,
//!   a writability flag, and a persistence flag
//! - **Block cells**: named references to nested state-bearing children
//! - **Collections**: keyed groups of homogeneous children
//! - **Walkers**: generic `snapshot` / `apply` / `describe` over the
//!   declared cell table, recursing through block cells
//!
//! The cell table of an owner is declared once, memoized, and never
//! mutated afterward; only the referenced values change.

pub mod cell;
pub mod collection;
pub mod error;
pub mod exported;

// Re-export main types
pub use cell::{CellKind, CellSpec, Constraint, StateDef, StateDefCell};
pub use collection::CollectionState;
pub use error::StateError;
pub use exported::{apply_walk, ExportedState};

/// JSON value carried by every scalar cell.
pub type Value = serde_json::Value;

/// Ordered key/value mapping produced by `snapshot` and consumed by `apply`.
///
/// With serde_json's `preserve_order` feature this keeps key encounter
/// order, which the deferred block-cell application rule depends on.
pub type Snapshot = serde_json::Map<String, Value>;
