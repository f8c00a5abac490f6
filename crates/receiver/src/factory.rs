//! Mode-keyed receiver construction

use crate::{Receiver, ReceiverError};
use skywave_ports::{ControlHook, DemodKind, DemodSpec, Mode, TopologyEngine};
use skywave_state::{ExportedState, Snapshot};
use std::collections::HashSet;
use std::rc::Rc;

/// Input-side parameters a receiver is built against.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverContext {
    pub input_rate: f64,
    pub input_center_freq: f64,
    pub audio_rate: u32,
}

/// Parse a mode tag; unrecognized tags fail loudly.
pub fn parse_mode(tag: &str) -> Result<Mode, ReceiverError> {
    Mode::parse(tag).ok_or_else(|| ReceiverError::UnknownMode(tag.to_string()))
}

/// Build a receiver from a mode and a state template.
///
/// The template is the previous snapshot of this receiver (rebuild), an
/// arbitrary sibling's snapshot, or the saved default (creation), possibly
/// overlaid with caller-supplied initial state. The mode tag is stripped,
/// constructor-only options are extracted into the demodulator spec, and
/// the remainder is filtered to cells the new receiver declares writable -
/// templates may come from a receiver of a different mode - then applied.
///
/// The hook must still be disabled when this is called; the orchestrator
/// enables it after registration, so any requests triggered by the state
/// application never reenter it mid-construction.
pub fn build_receiver(
    mode: Mode,
    template: &Snapshot,
    ctx: &ReceiverContext,
    hook: Rc<dyn ControlHook>,
    engine: &mut dyn TopologyEngine,
) -> Result<Receiver, ReceiverError> {
    let mut state = template.clone();
    state.shift_remove("mode");

    let kind = match mode {
        Mode::Iq => DemodKind::Iq,
        Mode::Nfm => DemodKind::Nfm,
        Mode::Wfm => DemodKind::Wfm {
            stereo: take_bool(&mut state, "stereo", true),
            audio_filter: take_bool(&mut state, "audio_filter", true),
        },
        Mode::Am => DemodKind::Am,
        Mode::Usb => DemodKind::Ssb { upper: true },
        Mode::Lsb => DemodKind::Ssb { upper: false },
        Mode::Vor => DemodKind::Vor,
    };

    log::debug!("building {} receiver against {} Hz input", mode, ctx.input_rate);
    let node = engine.new_demodulator(&DemodSpec {
        kind,
        input_rate: ctx.input_rate,
        audio_rate: ctx.audio_rate,
    })?;

    let mut receiver = Receiver::new(
        mode,
        kind,
        node,
        ctx.input_rate,
        ctx.input_center_freq,
        ctx.audio_rate,
        hook,
    );

    let writable: HashSet<String> = receiver
        .state_table()
        .cells()
        .iter()
        .filter(|spec| spec.is_writable())
        .map(|spec| spec.name().to_string())
        .collect();
    let filtered: Snapshot = state
        .into_iter()
        .filter(|(key, _)| writable.contains(key))
        .collect();

    if let Err(err) = receiver.apply(&filtered) {
        engine.release(node);
        return Err(err.into());
    }
    Ok(receiver)
}

fn take_bool(state: &mut Snapshot, key: &str, default: bool) -> bool {
    state
        .shift_remove(key)
        .and_then(|v| v.as_bool())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skywave_ports::{
        AudioFrame, Endpoint, GraphError, NodeId, SpectrumFrame, SpectrumParams,
    };
    use skywave_state::StateError;
    use std::cell::RefCell;
    use tokio::sync::broadcast;

    /// Engine stub recording demodulator specs.
    #[derive(Default)]
    struct StubEngine {
        demods: Vec<DemodSpec>,
        released: Vec<NodeId>,
        next_id: u64,
    }

    impl StubEngine {
        fn next(&mut self) -> NodeId {
            self.next_id += 1;
            NodeId(self.next_id)
        }
    }

    impl TopologyEngine for StubEngine {
        fn start(&mut self) {}
        fn stop(&mut self) {}
        fn pause(&mut self) {}
        fn resume(&mut self) {}
        fn disconnect_all(&mut self) {}

        fn connect(&mut self, _from: Endpoint, _to: Endpoint) -> Result<(), GraphError> {
            Ok(())
        }

        fn release(&mut self, node: NodeId) {
            self.released.push(node);
        }

        fn new_source(&mut self, _label: &str) -> NodeId {
            self.next()
        }

        fn new_demodulator(&mut self, spec: &DemodSpec) -> Result<NodeId, GraphError> {
            self.demods.push(spec.clone());
            Ok(self.next())
        }

        fn new_spectrum_stage(&mut self, _params: &SpectrumParams) -> NodeId {
            self.next()
        }

        fn new_spectrum_sink(
            &mut self,
            _resolution: u32,
            _frames: broadcast::Sender<SpectrumFrame>,
        ) -> NodeId {
            self.next()
        }

        fn new_adder(&mut self) -> NodeId {
            self.next()
        }

        fn new_interleave(&mut self, _channels: u32) -> NodeId {
            self.next()
        }

        fn new_audio_queue_sink(
            &mut self,
            _channels: u32,
            _frames: broadcast::Sender<AudioFrame>,
        ) -> NodeId {
            self.next()
        }

        fn new_audio_sink(&mut self, _sample_rate: u32) -> NodeId {
            self.next()
        }
    }

    /// Hook stub recording calls.
    #[derive(Default)]
    struct StubHook {
        revalidations: RefCell<u32>,
        replacements: RefCell<Vec<Mode>>,
    }

    impl ControlHook for StubHook {
        fn revalidate(&self) {
            *self.revalidations.borrow_mut() += 1;
        }

        fn rebuild(&self) {}

        fn replace(&self, mode: Mode) {
            self.replacements.borrow_mut().push(mode);
        }
    }

    fn ctx() -> ReceiverContext {
        ReceiverContext {
            input_rate: 2_000_000.0,
            input_center_freq: 100_000_000.0,
            audio_rate: 44_100,
        }
    }

    fn obj(value: serde_json::Value) -> Snapshot {
        match value {
            serde_json::Value::Object(map) => map,
            _ => Snapshot::new(),
        }
    }

    #[test]
    fn test_usb_and_lsb_share_one_implementation() {
        let mut engine = StubEngine::default();
        let usb = build_receiver(
            Mode::Usb,
            &Snapshot::new(),
            &ctx(),
            Rc::new(StubHook::default()),
            &mut engine,
        )
        .unwrap();
        let lsb = build_receiver(
            Mode::Lsb,
            &Snapshot::new(),
            &ctx(),
            Rc::new(StubHook::default()),
            &mut engine,
        )
        .unwrap();
        assert_eq!(usb.demod_kind(), DemodKind::Ssb { upper: true });
        assert_eq!(lsb.demod_kind(), DemodKind::Ssb { upper: false });
    }

    #[test]
    fn test_constructor_options_reach_the_demod_spec() {
        let mut engine = StubEngine::default();
        let template = obj(json!({
            "mode": "WFM",
            "stereo": false,
            "audio_filter": true,
            "rec_freq": 99_500_000.0,
        }));
        let receiver = build_receiver(
            Mode::Wfm,
            &template,
            &ctx(),
            Rc::new(StubHook::default()),
            &mut engine,
        )
        .unwrap();
        assert_eq!(
            engine.demods[0].kind,
            DemodKind::Wfm {
                stereo: false,
                audio_filter: true
            }
        );
        assert_eq!(receiver.rec_freq(), 99_500_000.0);
        // Options survive into the snapshot for reconstruction.
        let snap = receiver.snapshot();
        assert_eq!(snap["stereo"], false);
        assert_eq!(snap["audio_filter"], true);
    }

    #[test]
    fn test_round_trip_same_mode_reproduces_snapshot() {
        let mut engine = StubEngine::default();
        let template = obj(json!({
            "rec_freq": 100_700_000.0,
            "audio_gain": -6.0,
        }));
        let first = build_receiver(
            Mode::Wfm,
            &template,
            &ctx(),
            Rc::new(StubHook::default()),
            &mut engine,
        )
        .unwrap();
        let snap = first.snapshot();
        let second = build_receiver(
            Mode::Wfm,
            &snap,
            &ctx(),
            Rc::new(StubHook::default()),
            &mut engine,
        )
        .unwrap();
        assert_eq!(snap, second.snapshot());
    }

    #[test]
    fn test_reapplying_fixed_cells_is_a_noop_but_changing_them_fails() {
        let mut engine = StubEngine::default();
        let mut receiver = build_receiver(
            Mode::Wfm,
            &Snapshot::new(),
            &ctx(),
            Rc::new(StubHook::default()),
            &mut engine,
        )
        .unwrap();
        let snap = receiver.snapshot();
        // A receiver's own snapshot applies cleanly back onto it.
        receiver.apply(&snap).unwrap();
        assert_eq!(receiver.snapshot(), snap);

        let mut changed = snap.clone();
        changed.insert("stereo".to_string(), json!(false));
        let err = receiver.apply(&changed).unwrap_err();
        assert!(matches!(err, StateError::NotWritable(ref k) if k == "stereo"));
    }

    #[test]
    fn test_cross_mode_template_is_filtered() {
        let mut engine = StubEngine::default();
        let wfm = build_receiver(
            Mode::Wfm,
            &Snapshot::new(),
            &ctx(),
            Rc::new(StubHook::default()),
            &mut engine,
        )
        .unwrap();
        // A WFM snapshot carries stereo/audio_filter, which an AM receiver
        // does not declare; creation filters them out instead of failing.
        let am = build_receiver(
            Mode::Am,
            &wfm.snapshot(),
            &ctx(),
            Rc::new(StubHook::default()),
            &mut engine,
        )
        .unwrap();
        assert_eq!(am.mode(), Mode::Am);
        assert!(!am.snapshot().contains_key("stereo"));
    }

    #[test]
    fn test_invalid_template_value_fails_and_releases_the_node() {
        let mut engine = StubEngine::default();
        let template = obj(json!({ "audio_gain": 99.0 }));
        let err = build_receiver(
            Mode::Am,
            &template,
            &ctx(),
            Rc::new(StubHook::default()),
            &mut engine,
        )
        .unwrap_err();
        assert!(matches!(err, ReceiverError::State(_)));
        assert_eq!(engine.released.len(), 1);
    }

    #[test]
    fn test_unknown_mode_tag_fails_loudly() {
        assert!(matches!(
            parse_mode("FSK"),
            Err(ReceiverError::UnknownMode(ref tag)) if tag == "FSK"
        ));
    }

    #[test]
    fn test_validity_tracks_source_coverage() {
        let mut engine = StubEngine::default();
        let mut receiver = build_receiver(
            Mode::Am,
            &Snapshot::new(),
            &ctx(),
            Rc::new(StubHook::default()),
            &mut engine,
        )
        .unwrap();
        // Tuned at center of a 2 MHz-wide passband: valid.
        assert!(receiver.is_valid());
        // Retune outside coverage: invalid, mode and frequency unchanged.
        let snap = obj(json!({ "rec_freq": 101_500_000.0 }));
        receiver.apply(&snap).unwrap();
        assert!(!receiver.is_valid());
        assert_eq!(receiver.mode(), Mode::Am);
        assert_eq!(receiver.rec_freq(), 101_500_000.0);
    }

    #[test]
    fn test_rec_freq_write_requests_revalidation() {
        let mut engine = StubEngine::default();
        let hook = Rc::new(StubHook::default());
        let mut receiver = build_receiver(
            Mode::Nfm,
            &Snapshot::new(),
            &ctx(),
            hook.clone(),
            &mut engine,
        )
        .unwrap();
        let before = *hook.revalidations.borrow();
        receiver
            .apply(&obj(json!({ "rec_freq": 100_100_000.0 })))
            .unwrap();
        assert_eq!(*hook.revalidations.borrow(), before + 1);

        receiver
            .apply(&obj(json!({ "mode": "AM" })))
            .unwrap();
        assert_eq!(*hook.replacements.borrow(), vec![Mode::Am]);
    }
}
