//! Topology engine port and graph vocabulary
//!
//! The engine owns the concrete DSP nodes; the control plane only
//! constructs nodes through it and wires endpoints together. All control
//! calls are synchronous; no call blocks on data flowing through the
//! topology.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Engine-assigned identifier of a topology node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Endpoint at a given port of this node.
    pub fn port(self, port: u32) -> Endpoint {
        Endpoint { node: self, port }
    }
}

/// One port of one node; the unit the engine wires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub node: NodeId,
    pub port: u32,
}

impl From<NodeId> for Endpoint {
    fn from(node: NodeId) -> Endpoint {
        node.port(0)
    }
}

/// Parameters of the spectrum-analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumParams {
    pub sample_rate: f64,
    pub resolution: u32,
    pub frame_rate: f64,
}

/// Demodulator implementation selector.
///
/// The USB and LSB mode tags both map to `Ssb`; the sideband choice is a
/// parameter of the shared implementation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DemodKind {
    Iq,
    Nfm,
    Wfm { stereo: bool, audio_filter: bool },
    Am,
    Ssb { upper: bool },
    Vor,
}

/// Everything the engine needs to construct a demodulator node.
#[derive(Debug, Clone, PartialEq)]
pub struct DemodSpec {
    pub kind: DemodKind,
    pub input_rate: f64,
    pub audio_rate: u32,
}

/// One frame of spectrum-analysis output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumFrame {
    pub data: Vec<f32>,
}

/// One block of interleaved multi-channel audio samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
}

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("cannot connect {from:?} -> {to:?}: {reason}")]
    Connect {
        from: Endpoint,
        to: Endpoint,
        reason: String,
    },

    #[error("unknown node: {0:?}")]
    UnknownNode(NodeId),

    #[error("unsupported node request: {0}")]
    Unsupported(String),
}

/// Port to the topology engine.
///
/// `pause`/`resume` bracket every rewire; `disconnect_all` tears down the
/// full edge set. Nodes are constructed through the `new_*` methods and
/// handed back as ids; `release` retires a node the control plane will not
/// wire again.
pub trait TopologyEngine {
    fn start(&mut self);
    fn stop(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn disconnect_all(&mut self);
    fn connect(&mut self, from: Endpoint, to: Endpoint) -> Result<(), GraphError>;
    fn release(&mut self, node: NodeId);

    /// Stream node fed by a signal source.
    fn new_source(&mut self, label: &str) -> NodeId;

    /// Demodulator node for one receiver.
    fn new_demodulator(&mut self, spec: &DemodSpec) -> Result<NodeId, GraphError>;

    /// Spectrum-analysis stage.
    fn new_spectrum_stage(&mut self, params: &SpectrumParams) -> NodeId;

    /// Sink turning spectrum-stage output into frames on a queue.
    fn new_spectrum_sink(
        &mut self,
        resolution: u32,
        frames: broadcast::Sender<SpectrumFrame>,
    ) -> NodeId;

    /// N-input summing node.
    fn new_adder(&mut self) -> NodeId;

    /// Interleaves N parallel streams into one frame stream.
    fn new_interleave(&mut self, channels: u32) -> NodeId;

    /// Sink turning interleaved audio into frames on a queue.
    fn new_audio_queue_sink(
        &mut self,
        channels: u32,
        frames: broadcast::Sender<AudioFrame>,
    ) -> NodeId;

    /// Soundcard output sink.
    fn new_audio_sink(&mut self, sample_rate: u32) -> NodeId;
}
