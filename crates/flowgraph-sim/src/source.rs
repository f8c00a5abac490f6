//! Tunable, renewable simulated source

use crate::SimGraph;
use serde_json::json;
use skywave_ports::{NodeId, Source, TopologyEngine, TuneHook};
use skywave_state::{
    Constraint, ExportedState, StateDef, StateDefCell, StateError, Value,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug)]
struct SourceInner {
    label: String,
    sample_rate: f64,
    freq: f64,
    settle: Duration,
    needs_renew: bool,
    renew_count: u32,
}

/// Inspection/poke handle a test keeps after the source moves into the
/// orchestrator.
#[derive(Clone)]
pub struct SimSourceHandle {
    inner: Rc<RefCell<SourceInner>>,
}

impl SimSourceHandle {
    pub fn frequency(&self) -> f64 {
        self.inner.borrow().freq
    }

    /// Mark the live object unusable for the next rewire.
    pub fn set_needs_renew(&self, value: bool) {
        self.inner.borrow_mut().needs_renew = value;
    }

    pub fn renew_count(&self) -> u32 {
        self.inner.borrow().renew_count
    }
}

/// Simulated signal source.
///
/// Tuning goes through the state tree (`freq` cell), which fires the
/// registered tune hook the way retuning real hardware would.
pub struct SimSource {
    inner: Rc<RefCell<SourceInner>>,
    graph: SimGraph,
    node: NodeId,
    hook: Option<TuneHook>,
    table: StateDefCell,
}

impl SimSource {
    pub fn new(
        graph: &SimGraph,
        label: &str,
        sample_rate: f64,
        freq: f64,
        settle: Duration,
    ) -> Self {
        let mut graph = graph.clone();
        let node = graph.new_source(label);
        SimSource {
            inner: Rc::new(RefCell::new(SourceInner {
                label: label.to_string(),
                sample_rate,
                freq,
                settle,
                needs_renew: false,
                renew_count: 0,
            })),
            graph,
            node,
            hook: None,
            table: StateDefCell::new(),
        }
    }

    pub fn handle(&self) -> SimSourceHandle {
        SimSourceHandle {
            inner: self.inner.clone(),
        }
    }
}

impl ExportedState for SimSource {
    fn state_def(&self, def: &mut StateDef) {
        def.writable("freq", Constraint::Float);
        def.read_only("sample_rate", Constraint::Integer);
    }

    fn state_table(&self) -> &StateDef {
        self.table.get_or_declare(self)
    }

    fn cell_get(&self, name: &str) -> Result<Value, StateError> {
        let inner = self.inner.borrow();
        match name {
            "freq" => Ok(json!(inner.freq)),
            "sample_rate" => Ok(json!(inner.sample_rate as i64)),
            _ => Err(StateError::UnknownProperty(name.to_string())),
        }
    }

    fn cell_set(&mut self, name: &str, value: Value) -> Result<(), StateError> {
        match name {
            "freq" => {
                {
                    let mut inner = self.inner.borrow_mut();
                    inner.freq = value.as_f64().unwrap_or(inner.freq);
                }
                if let Some(hook) = &self.hook {
                    hook();
                }
                Ok(())
            }
            _ => Err(StateError::UnknownProperty(name.to_string())),
        }
    }
}

impl Source for SimSource {
    fn node(&self) -> NodeId {
        self.node
    }

    fn label(&self) -> String {
        self.inner.borrow().label.clone()
    }

    fn sample_rate(&self) -> f64 {
        self.inner.borrow().sample_rate
    }

    fn frequency(&self) -> f64 {
        self.inner.borrow().freq
    }

    fn tune_settling_delay(&self) -> Duration {
        self.inner.borrow().settle
    }

    fn set_tune_hook(&mut self, hook: TuneHook) {
        self.hook = Some(hook);
    }

    fn needs_renew(&self) -> bool {
        self.inner.borrow().needs_renew
    }

    fn renew(&self) -> Box<dyn Source> {
        let node = {
            let mut graph = self.graph.clone();
            graph.new_source(&self.inner.borrow().label)
        };
        {
            let mut inner = self.inner.borrow_mut();
            inner.needs_renew = false;
            inner.renew_count += 1;
        }
        Box::new(SimSource {
            inner: self.inner.clone(),
            graph: self.graph.clone(),
            node,
            hook: None,
            table: StateDefCell::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuning_through_the_tree_fires_the_hook() {
        let graph = SimGraph::new();
        let mut source = SimSource::new(
            &graph,
            "test rig",
            2_000_000.0,
            100_000_000.0,
            Duration::from_millis(250),
        );
        let fired = Rc::new(RefCell::new(0u32));
        let fired_in_hook = fired.clone();
        source.set_tune_hook(Box::new(move || {
            *fired_in_hook.borrow_mut() += 1;
        }));

        let snap = match json!({ "freq": 101_000_000.0 }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        source.apply(&snap).unwrap();
        assert_eq!(*fired.borrow(), 1);
        assert_eq!(source.frequency(), 101_000_000.0);
    }

    #[test]
    fn test_renew_keeps_configuration_under_a_new_node() {
        let graph = SimGraph::new();
        let source = SimSource::new(
            &graph,
            "test rig",
            2_000_000.0,
            100_000_000.0,
            Duration::from_millis(250),
        );
        let handle = source.handle();
        handle.set_needs_renew(true);

        let renewed = source.renew();
        assert!(!renewed.needs_renew());
        assert_eq!(renewed.sample_rate(), 2_000_000.0);
        assert_ne!(renewed.node(), source.node());
        assert_eq!(handle.renew_count(), 1);
    }
}
