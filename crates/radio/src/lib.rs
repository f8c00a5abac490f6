//! Skywave Radio - Graph Orchestrator
//!
//! Reconfigures a live signal-processing topology while it runs:
//!
//! - **Radio**: owns source selection, spectrum settings, and the receiver
//!   table; `reconcile` re-derives the live wiring from dirty flags
//! - **ReceiverFacet**: deferred-enable capability receivers use to request
//!   revalidation and rebuilds on themselves
//! - **Session**: async driver for the tune-settled timers
//! - **SystemClock**: production wall/CPU time source
//!
//! ## Architecture
//!
//! ```text
//!  commands / state tree
//!          │
//!          ▼
//!  ┌───────────────────┐   dirty flags   ┌──────────────────────┐
//!  │       Radio       ├────────────────►│      reconcile       │
//!  │  sources/receivers│                 │ audio → source →     │
//!  └─────────┬─────────┘                 │ spectrum → rebuild → │
//!            │ facet mailbox             │ renew → reconnect    │
//!            ▼                           └──────────┬───────────┘
//!  ┌───────────────────┐                            │ pause/wire/resume
//!  │     Receivers     │                            ▼
//!  └───────────────────┘                 ┌──────────────────────┐
//!                                        │   Topology engine    │
//!                                        └──────────────────────┘
//! ```

pub mod clock;
pub mod cpu;
pub mod error;
pub mod facet;
pub mod keys;
pub mod radio;
pub mod session;

// Re-export main types
pub use clock::SystemClock;
pub use cpu::CpuMonitor;
pub use error::{RadioError, Result};
pub use facet::ReceiverFacet;
pub use keys::receiver_key;
pub use radio::{Radio, RadioConfig, SpectrumInfo, MAX_MIXED_RECEIVERS, MAX_RECEIVERS};
pub use session::Session;
