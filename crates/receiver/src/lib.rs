//! Skywave Receiver
//!
//! One receiver per demodulated channel:
//!
//! - **Receiver**: state-bearing shell around an engine-built demodulator
//!   node - mode, tuned frequency, gain, per-mode extras, validity policy
//! - **Factory**: exhaustive mode-keyed construction over the closed tag
//!   set, with constructor-only option extraction and two-phase facet
//!   enablement driven by the orchestrator
//!
//! The DSP itself lives behind the topology engine; this crate only
//! carries the control-plane state and the wiring endpoints.

pub mod error;
pub mod factory;
pub mod receiver;

// Re-export main types
pub use error::ReceiverError;
pub use factory::{build_receiver, parse_mode, ReceiverContext};
pub use receiver::Receiver;
