//! The receiver shell: tuning state, validity policy, state tree

use serde_json::json;
use skywave_ports::{ControlHook, DemodKind, Endpoint, Mode, NodeId};
use skywave_state::{
    apply_walk, CellSpec, Constraint, ExportedState, Snapshot, StateDef, StateDefCell,
    StateError, Value,
};
use std::rc::Rc;

/// One demodulation channel.
///
/// Holds the control-plane state of a receiver; the signal path is the
/// engine-built demodulator node reachable through `node`. Receivers are
/// rate-dependent: when the input rate changes the orchestrator rebuilds
/// them in place rather than mutating `input_rate`.
pub struct Receiver {
    mode: Mode,
    demod_kind: DemodKind,
    node: NodeId,
    input_rate: f64,
    input_center_freq: f64,
    audio_rate: u32,
    rec_freq: f64,
    audio_gain: f64,
    zero_point: f64,
    hook: Rc<dyn ControlHook>,
    table: StateDefCell,
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("mode", &self.mode)
            .field("demod_kind", &self.demod_kind)
            .field("rec_freq", &self.rec_freq)
            .finish_non_exhaustive()
    }
}

impl Receiver {
    pub(crate) fn new(
        mode: Mode,
        demod_kind: DemodKind,
        node: NodeId,
        input_rate: f64,
        input_center_freq: f64,
        audio_rate: u32,
        hook: Rc<dyn ControlHook>,
    ) -> Self {
        Receiver {
            mode,
            demod_kind,
            node,
            input_rate,
            input_center_freq,
            audio_rate,
            rec_freq: input_center_freq,
            audio_gain: 0.0,
            zero_point: 0.0,
            hook,
            table: StateDefCell::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn demod_kind(&self) -> DemodKind {
        self.demod_kind
    }

    /// The demodulator node; input port 0, audio outputs on ports 0 and 1.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn audio_outputs(&self) -> (Endpoint, Endpoint) {
        (self.node.port(0), self.node.port(1))
    }

    pub fn rec_freq(&self) -> f64 {
        self.rec_freq
    }

    /// Updated by the orchestrator when a tune-settled notification fires.
    pub fn set_input_center_freq(&mut self, freq: f64) {
        self.input_center_freq = freq;
    }

    /// RF bandwidth this receiver needs from the source.
    pub fn bandwidth(&self) -> f64 {
        match self.demod_kind {
            DemodKind::Iq => self.audio_rate as f64,
            DemodKind::Nfm => 15_000.0,
            DemodKind::Wfm { .. } => 200_000.0,
            DemodKind::Am => 10_000.0,
            DemodKind::Ssb { .. } => 3_000.0,
            DemodKind::Vor => 25_000.0,
        }
    }

    /// Whether the tuned frequency and required bandwidth lie within the
    /// source coverage `input_center_freq ± input_rate / 2`.
    pub fn is_valid(&self) -> bool {
        let half_band = self.bandwidth() / 2.0;
        let half_coverage = self.input_rate / 2.0;
        self.rec_freq - half_band >= self.input_center_freq - half_coverage
            && self.rec_freq + half_band <= self.input_center_freq + half_coverage
    }
}

impl ExportedState for Receiver {
    fn state_def(&self, def: &mut StateDef) {
        def.writable(
            "mode",
            Constraint::enumeration(Mode::ALL.iter().map(|m| (m.tag(), m.tag()))),
        );
        def.writable("rec_freq", Constraint::Float);
        def.writable("audio_gain", Constraint::float_range(-30.0, 20.0, false));
        def.read_only("is_valid", Constraint::Boolean);
        match self.demod_kind {
            DemodKind::Wfm { .. } => {
                // Constructor-only options: persisted so a snapshot can
                // reproduce the receiver, but never applied after
                // construction.
                def.add(CellSpec::value("stereo", Constraint::Boolean).persists(true));
                def.add(CellSpec::value("audio_filter", Constraint::Boolean).persists(true));
            }
            DemodKind::Vor => {
                def.writable("zero_point", Constraint::float_range(-180.0, 180.0, false));
            }
            _ => {}
        }
    }

    fn state_table(&self) -> &StateDef {
        self.table.get_or_declare(self)
    }

    fn cell_get(&self, name: &str) -> Result<Value, StateError> {
        match (name, self.demod_kind) {
            ("mode", _) => Ok(json!(self.mode.tag())),
            ("rec_freq", _) => Ok(json!(self.rec_freq)),
            ("audio_gain", _) => Ok(json!(self.audio_gain)),
            ("is_valid", _) => Ok(json!(self.is_valid())),
            ("stereo", DemodKind::Wfm { stereo, .. }) => Ok(json!(stereo)),
            ("audio_filter", DemodKind::Wfm { audio_filter, .. }) => Ok(json!(audio_filter)),
            ("zero_point", DemodKind::Vor) => Ok(json!(self.zero_point)),
            _ => Err(StateError::UnknownProperty(name.to_string())),
        }
    }

    fn cell_set(&mut self, name: &str, value: Value) -> Result<(), StateError> {
        match name {
            "mode" => {
                let tag = value.as_str().unwrap_or_default();
                match Mode::parse(tag) {
                    Some(mode) if mode != self.mode => self.hook.replace(mode),
                    Some(_) => {}
                    None => {
                        return Err(StateError::UnknownVariant {
                            name: name.to_string(),
                            value: tag.to_string(),
                        });
                    }
                }
                Ok(())
            }
            "rec_freq" => {
                self.rec_freq = value.as_f64().unwrap_or(self.rec_freq);
                self.hook.revalidate();
                Ok(())
            }
            "audio_gain" => {
                self.audio_gain = value.as_f64().unwrap_or(self.audio_gain);
                Ok(())
            }
            "zero_point" if self.demod_kind == DemodKind::Vor => {
                self.zero_point = value.as_f64().unwrap_or(self.zero_point);
                Ok(())
            }
            _ => Err(StateError::UnknownProperty(name.to_string())),
        }
    }

    /// Constructor-only cells persist so a snapshot can reproduce the
    /// receiver, but they are fixed after construction: re-applying an
    /// unchanged value is a no-op, changing one fails.
    fn apply(&mut self, snap: &Snapshot) -> Result<(), StateError> {
        let mut rest = Snapshot::new();
        for (key, value) in snap {
            let fixed = matches!(
                self.state_table().get(key),
                Some(spec) if !spec.is_writable() && spec.is_persisting()
            );
            if fixed {
                if self.cell_get(key)? == *value {
                    continue;
                }
                return Err(StateError::NotWritable(key.clone()));
            }
            rest.insert(key.clone(), value.clone());
        }
        apply_walk(self, &rest)
    }
}
