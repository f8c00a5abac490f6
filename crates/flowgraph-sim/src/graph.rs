//! Book-keeping topology engine

use skywave_ports::{
    AudioFrame, DemodSpec, Endpoint, GraphError, NodeId, SpectrumFrame, SpectrumParams,
    TopologyEngine,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tokio::sync::broadcast;

/// What a simulated node stands in for.
#[derive(Debug, Clone, PartialEq)]
pub enum SimNodeKind {
    Source { label: String },
    Demodulator(DemodSpec),
    SpectrumStage(SpectrumParams),
    SpectrumSink { resolution: u32 },
    Adder,
    Interleave { channels: u32 },
    AudioQueueSink { channels: u32 },
    AudioSink { sample_rate: u32 },
}

#[derive(Default)]
struct GraphInner {
    nodes: BTreeMap<NodeId, SimNodeKind>,
    edges: Vec<(Endpoint, Endpoint)>,
    next_id: u64,
    running: bool,
    paused: bool,
    pauses: u32,
    resumes: u32,
    teardowns: u32,
    released: Vec<NodeId>,
    fail_connects: u32,
    spectrum_tx: Option<broadcast::Sender<SpectrumFrame>>,
    audio_tx: Option<broadcast::Sender<AudioFrame>>,
}

impl GraphInner {
    fn add_node(&mut self, kind: SimNodeKind) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(id, kind);
        id
    }
}

/// Topology engine that records wiring instead of running DSP.
///
/// Clones share one graph, so a test keeps a handle after moving the
/// engine into the orchestrator.
#[derive(Clone, Default)]
pub struct SimGraph {
    inner: Rc<RefCell<GraphInner>>,
}

impl SimGraph {
    pub fn new() -> Self {
        SimGraph::default()
    }

    pub fn is_running(&self) -> bool {
        self.inner.borrow().running
    }

    pub fn is_paused(&self) -> bool {
        self.inner.borrow().paused
    }

    pub fn pause_count(&self) -> u32 {
        self.inner.borrow().pauses
    }

    pub fn resume_count(&self) -> u32 {
        self.inner.borrow().resumes
    }

    pub fn teardown_count(&self) -> u32 {
        self.inner.borrow().teardowns
    }

    pub fn edge_count(&self) -> usize {
        self.inner.borrow().edges.len()
    }

    pub fn edges(&self) -> Vec<(Endpoint, Endpoint)> {
        self.inner.borrow().edges.clone()
    }

    pub fn node_kind(&self, node: NodeId) -> Option<SimNodeKind> {
        self.inner.borrow().nodes.get(&node).cloned()
    }

    /// Live (not released) nodes matching a predicate.
    pub fn nodes_where<F>(&self, mut pred: F) -> Vec<NodeId>
    where
        F: FnMut(&SimNodeKind) -> bool,
    {
        let inner = self.inner.borrow();
        inner
            .nodes
            .iter()
            .filter(|(id, kind)| !inner.released.contains(id) && pred(kind))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Whether any edge runs from `from` to `to`, on any port pair.
    pub fn wired(&self, from: NodeId, to: NodeId) -> bool {
        self.inner
            .borrow()
            .edges
            .iter()
            .any(|(a, b)| a.node == from && b.node == to)
    }

    /// Number of edges terminating at `node`.
    pub fn inputs_of(&self, node: NodeId) -> usize {
        self.inner
            .borrow()
            .edges
            .iter()
            .filter(|(_, to)| to.node == node)
            .count()
    }

    pub fn released(&self) -> Vec<NodeId> {
        self.inner.borrow().released.clone()
    }

    /// Make the next `count` connect calls fail.
    pub fn fail_connects(&self, count: u32) {
        self.inner.borrow_mut().fail_connects = count;
    }

    /// Push a frame through the current spectrum sink, as the DSP would.
    pub fn emit_spectrum(&self, frame: SpectrumFrame) -> bool {
        match &self.inner.borrow().spectrum_tx {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Push a frame through the current audio queue sink.
    pub fn emit_audio(&self, frame: AudioFrame) -> bool {
        match &self.inner.borrow().audio_tx {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }
}

impl TopologyEngine for SimGraph {
    fn start(&mut self) {
        self.inner.borrow_mut().running = true;
    }

    fn stop(&mut self) {
        self.inner.borrow_mut().running = false;
    }

    fn pause(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.paused = true;
        inner.pauses += 1;
    }

    fn resume(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.paused = false;
        inner.resumes += 1;
    }

    fn disconnect_all(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.edges.clear();
        inner.teardowns += 1;
    }

    fn connect(&mut self, from: Endpoint, to: Endpoint) -> Result<(), GraphError> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_connects > 0 {
            inner.fail_connects -= 1;
            return Err(GraphError::Connect {
                from,
                to,
                reason: "injected failure".to_string(),
            });
        }
        for end in [from.node, to.node] {
            if !inner.nodes.contains_key(&end) || inner.released.contains(&end) {
                return Err(GraphError::UnknownNode(end));
            }
        }
        log::trace!("connect {:?} -> {:?}", from, to);
        inner.edges.push((from, to));
        Ok(())
    }

    fn release(&mut self, node: NodeId) {
        self.inner.borrow_mut().released.push(node);
    }

    fn new_source(&mut self, label: &str) -> NodeId {
        self.inner.borrow_mut().add_node(SimNodeKind::Source {
            label: label.to_string(),
        })
    }

    fn new_demodulator(&mut self, spec: &DemodSpec) -> Result<NodeId, GraphError> {
        Ok(self
            .inner
            .borrow_mut()
            .add_node(SimNodeKind::Demodulator(spec.clone())))
    }

    fn new_spectrum_stage(&mut self, params: &SpectrumParams) -> NodeId {
        self.inner
            .borrow_mut()
            .add_node(SimNodeKind::SpectrumStage(params.clone()))
    }

    fn new_spectrum_sink(
        &mut self,
        resolution: u32,
        frames: broadcast::Sender<SpectrumFrame>,
    ) -> NodeId {
        let mut inner = self.inner.borrow_mut();
        inner.spectrum_tx = Some(frames);
        inner.add_node(SimNodeKind::SpectrumSink { resolution })
    }

    fn new_adder(&mut self) -> NodeId {
        self.inner.borrow_mut().add_node(SimNodeKind::Adder)
    }

    fn new_interleave(&mut self, channels: u32) -> NodeId {
        self.inner
            .borrow_mut()
            .add_node(SimNodeKind::Interleave { channels })
    }

    fn new_audio_queue_sink(
        &mut self,
        channels: u32,
        frames: broadcast::Sender<AudioFrame>,
    ) -> NodeId {
        let mut inner = self.inner.borrow_mut();
        inner.audio_tx = Some(frames);
        inner.add_node(SimNodeKind::AudioQueueSink { channels })
    }

    fn new_audio_sink(&mut self, sample_rate: u32) -> NodeId {
        self.inner
            .borrow_mut()
            .add_node(SimNodeKind::AudioSink { sample_rate })
    }
}
