//! The graph orchestrator
//!
//! Owns source selection, spectrum settings, the receiver table, and the
//! dirty flags; `reconcile` re-derives the live topology from them in six
//! strictly ordered phases:
//!
//! 1. audio restart
//! 2. source switch (registers the tune-settled hook, detects rate change)
//! 3. spectrum-chain rebuild
//! 4. receiver rebuild on rate change
//! 5. source renewal
//! 6. reconnect (pause, full teardown, rewire, resume)

use crate::cpu::CpuMonitor;
use crate::error::RadioError;
use crate::facet::{FacetRequest, Mailbox, ReceiverFacet};
use crate::keys::receiver_key;
use priority_queue::PriorityQueue;
use serde::Serialize;
use serde_json::json;
use skywave_ports::{
    AudioFrame, Clock, Mode, NodeId, Source, SpectrumFrame, SpectrumParams, TopologyEngine,
};
use skywave_receiver::{build_receiver, parse_mode, Receiver, ReceiverContext};
use skywave_state::{
    CollectionState, Constraint, ExportedState, Snapshot, StateDef, StateDefCell, StateError,
    Value,
};
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Hard ceiling on simultaneously configured receivers.
pub const MAX_RECEIVERS: usize = 100;

/// Ceiling on receivers wired into the audio mix per reconnect pass.
pub const MAX_MIXED_RECEIVERS: usize = 6;

const SPECTRUM_QUEUE_DEPTH: usize = 10;
const AUDIO_QUEUE_DEPTH: usize = 100;
const AUDIO_CHANNELS: u32 = 2;

/// Construction-time settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RadioConfig {
    pub audio_rate: u32,
    pub spectrum_resolution: u32,
    pub spectrum_rate: f64,
}

impl Default for RadioConfig {
    fn default() -> Self {
        RadioConfig {
            audio_rate: 44_100,
            spectrum_resolution: 4096,
            spectrum_rate: 30.0,
        }
    }
}

/// Spectrum frame metadata, exposed alongside the frame queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumInfo {
    pub center_freq: f64,
    pub resolution: u32,
    pub frame_rate: f64,
}

/// Identity of the source object currently wired into the topology.
///
/// The epoch is bumped on every install (switch or renewal); tune-settled
/// notifications carry it and are dropped when it no longer matches.
struct LiveSource {
    key: String,
    epoch: u64,
}

struct SpectrumChain {
    stage: NodeId,
    sink: NodeId,
    frames: broadcast::Sender<SpectrumFrame>,
}

/// The orchestrator.
///
/// Single-writer: every mutation runs on the control thread, sets dirty
/// flags, and ends in `reconcile`. The only asynchronous suspension is
/// the tune-settled timer, driven through `poll_timers`.
pub struct Radio {
    engine: Box<dyn TopologyEngine>,
    clock: Box<dyn Clock>,
    running: bool,
    source_name: String,
    sources: CollectionState<Box<dyn Source>>,
    live: Option<LiveSource>,
    epoch_counter: u64,
    input_rate: Option<f64>,
    input_freq: f64,
    audio_rate: u32,
    spectrum_resolution: u32,
    spectrum_rate: f64,
    spectrum: Option<SpectrumChain>,
    receivers: CollectionState<Receiver>,
    receiver_valid: BTreeMap<String, bool>,
    key_counter: u64,
    receiver_defaults: Snapshot,
    needs_audio_restart: bool,
    needs_spectrum: bool,
    needs_reconnect: bool,
    mailbox: Rc<RefCell<Mailbox>>,
    settle_timers: PriorityQueue<u64, Reverse<Duration>>,
    audio_join: NodeId,
    audio_queue_sink: NodeId,
    audio_frames: broadcast::Sender<AudioFrame>,
    audio_sink: Option<NodeId>,
    mixers: Option<(NodeId, NodeId)>,
    cpu: RefCell<CpuMonitor>,
    table: StateDefCell,
}

impl std::fmt::Debug for Radio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Radio")
            .field("running", &self.running)
            .field("source_name", &self.source_name)
            .finish_non_exhaustive()
    }
}

impl Radio {
    pub fn new(
        mut engine: Box<dyn TopologyEngine>,
        clock: Box<dyn Clock>,
        sources: BTreeMap<String, Box<dyn Source>>,
        initial_source: &str,
        config: RadioConfig,
    ) -> Result<Radio, RadioError> {
        if !sources.contains_key(initial_source) {
            return Err(RadioError::UnknownSource(initial_source.to_string()));
        }

        let (audio_frames, _) = broadcast::channel(AUDIO_QUEUE_DEPTH);
        let audio_join = engine.new_interleave(AUDIO_CHANNELS);
        let audio_queue_sink = engine.new_audio_queue_sink(AUDIO_CHANNELS, audio_frames.clone());
        let cpu = CpuMonitor::new(clock.as_ref());

        let mut radio = Radio {
            engine,
            clock,
            running: false,
            source_name: initial_source.to_string(),
            sources: CollectionState::new_static(sources),
            live: None,
            epoch_counter: 0,
            input_rate: None,
            input_freq: 0.0,
            audio_rate: config.audio_rate,
            spectrum_resolution: config.spectrum_resolution,
            spectrum_rate: config.spectrum_rate,
            spectrum: None,
            receivers: CollectionState::new_dynamic(),
            receiver_valid: BTreeMap::new(),
            key_counter: 0,
            receiver_defaults: Snapshot::new(),
            needs_audio_restart: true,
            needs_spectrum: true,
            needs_reconnect: true,
            mailbox: Rc::new(RefCell::new(Mailbox::default())),
            settle_timers: PriorityQueue::new(),
            audio_join,
            audio_queue_sink,
            audio_frames,
            audio_sink: None,
            mixers: None,
            cpu: RefCell::new(cpu),
            table: StateDefCell::new(),
        };
        radio.reconcile()?;
        Ok(radio)
    }

    // ---- commands ------------------------------------------------------

    /// Select the active source by key.
    pub fn select_source(&mut self, key: &str) -> Result<(), RadioError> {
        if key == self.source_name {
            return Ok(());
        }
        if !self.sources.contains_key(key) {
            return Err(RadioError::UnknownSource(key.to_string()));
        }
        self.source_name = key.to_string();
        self.settle()
    }

    /// Start or stop the whole topology.
    pub fn set_running(&mut self, value: bool) -> Result<(), RadioError> {
        if value == self.running {
            return Ok(());
        }
        self.running = value;
        if value {
            self.needs_audio_restart = true;
            self.settle()?;
            self.engine.start();
        } else {
            self.engine.stop();
        }
        Ok(())
    }

    pub fn set_spectrum_resolution(&mut self, resolution: u32) -> Result<(), RadioError> {
        if !(2..=4096).contains(&resolution) {
            return Err(StateError::OutOfRange {
                name: "spectrum_resolution".to_string(),
                value: resolution as f64,
            }
            .into());
        }
        self.spectrum_resolution = resolution;
        self.needs_spectrum = true;
        self.settle()
    }

    pub fn set_spectrum_rate(&mut self, rate: f64) -> Result<(), RadioError> {
        if !(1.0..=60.0).contains(&rate) {
            return Err(StateError::OutOfRange {
                name: "spectrum_rate".to_string(),
                value: rate,
            }
            .into());
        }
        self.spectrum_rate = rate;
        self.needs_spectrum = true;
        self.settle()
    }

    /// Create a receiver. With no explicit key a fresh base-26 key is
    /// allocated; with no explicit state the new receiver copies an
    /// arbitrary sibling, or the last-deleted receiver's snapshot when
    /// the table is empty.
    pub fn add_receiver(
        &mut self,
        mode: Mode,
        key: Option<&str>,
        initial: Option<&Snapshot>,
    ) -> Result<String, RadioError> {
        if self.receivers.len() >= MAX_RECEIVERS {
            return Err(RadioError::ReceiverLimit);
        }
        let key = match key {
            Some(k) => {
                if self.receivers.contains_key(k) {
                    return Err(RadioError::DuplicateReceiverKey(k.to_string()));
                }
                k.to_string()
            }
            None => loop {
                let candidate = receiver_key(self.key_counter);
                self.key_counter += 1;
                if !self.receivers.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let mut template = match self.receivers.values().next() {
            Some(existing) => existing.snapshot(),
            None => self.receiver_defaults.clone(),
        };
        if let Some(initial) = initial {
            for (k, v) in initial {
                template.insert(k.clone(), v.clone());
            }
        }

        let receiver = self.construct_receiver(mode, &template, &key)?;
        log::info!("adding receiver {:?} ({})", key, mode);
        self.receivers.insert(key.clone(), receiver);
        self.receiver_valid.insert(key.clone(), false);
        self.needs_reconnect = true;
        self.settle()?;
        Ok(key)
    }

    /// Delete a receiver. The sole remaining receiver's snapshot becomes
    /// the template for the next creation into an empty table.
    pub fn delete_receiver(&mut self, key: &str) -> Result<(), RadioError> {
        if !self.receivers.contains_key(key) {
            return Err(RadioError::UnknownReceiver(key.to_string()));
        }
        if self.receivers.len() == 1 {
            if let Some(receiver) = self.receivers.get(key) {
                self.receiver_defaults = receiver.snapshot();
            }
        }
        log::info!("deleting receiver {:?}", key);
        if let Some(receiver) = self.receivers.remove(key) {
            self.engine.release(receiver.node());
        }
        self.receiver_valid.remove(key);
        self.needs_reconnect = true;
        self.settle()
    }

    /// Apply a snapshot to the full tree, then drain any requests the
    /// nested mutations queued.
    pub fn apply_state(&mut self, snap: &Snapshot) -> Result<(), RadioError> {
        self.apply(snap)?;
        self.settle()
    }

    // ---- metrics -------------------------------------------------------

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn input_rate(&self) -> Option<f64> {
        self.input_rate
    }

    pub fn audio_rate(&self) -> u32 {
        self.audio_rate
    }

    pub fn receiver_count(&self) -> usize {
        self.receivers.len()
    }

    pub fn cpu_use(&self) -> f64 {
        self.cpu.borrow_mut().sample(self.clock.as_ref())
    }

    pub fn spectrum_info(&self) -> SpectrumInfo {
        SpectrumInfo {
            center_freq: self.input_freq,
            resolution: self.spectrum_resolution,
            frame_rate: self.spectrum_rate,
        }
    }

    /// Subscribe to the live spectrum-frame queue. Rebuilding the
    /// spectrum chain replaces the queue; subscribers resubscribe.
    pub fn subscribe_spectrum(&self) -> Option<broadcast::Receiver<SpectrumFrame>> {
        self.spectrum.as_ref().map(|s| s.frames.subscribe())
    }

    /// Subscribe to the audio-frame queue.
    pub fn subscribe_audio(&self) -> broadcast::Receiver<AudioFrame> {
        self.audio_frames.subscribe()
    }

    // ---- timers --------------------------------------------------------

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Deadline of the earliest pending tune-settled timer.
    pub fn next_timer_due(&self) -> Option<Duration> {
        self.settle_timers.peek().map(|(_, Reverse(due))| *due)
    }

    /// Fire every due tune-settled timer, then reconcile.
    pub fn poll_timers(&mut self) -> Result<(), RadioError> {
        let now = self.clock.now();
        loop {
            let due = matches!(
                self.settle_timers.peek(),
                Some((_, Reverse(due))) if *due <= now
            );
            if !due {
                break;
            }
            if let Some((epoch, _)) = self.settle_timers.pop() {
                self.tune_settled(epoch)?;
            }
        }
        self.settle()
    }

    // ---- reconciliation ------------------------------------------------

    /// Align the live topology with the configuration. Phases run in
    /// strict order; each may force a later flag.
    pub fn reconcile(&mut self) -> Result<(), RadioError> {
        // Phase 1: audio restart
        if self.needs_audio_restart {
            log::debug!("audio restart requested; forcing reconnect");
            self.needs_reconnect = true;
        }

        // Phase 2: source switch
        let mut rate_changed = false;
        let switch = self.needs_audio_restart
            || !matches!(&self.live, Some(live) if live.key == self.source_name);
        if switch {
            log::info!("switching source to {:?}", self.source_name);
            self.needs_reconnect = true;
            self.epoch_counter += 1;
            let epoch = self.epoch_counter;
            let hook = self.tune_hook_for(epoch);
            let name = self.source_name.clone();
            let source = self
                .sources
                .get_mut(&name)
                .ok_or_else(|| RadioError::UnknownSource(name.clone()))?;
            source.set_tune_hook(hook);
            let rate = source.sample_rate();
            rate_changed = self.input_rate != Some(rate);
            self.input_rate = Some(rate);
            self.input_freq = source.frequency();
            self.live = Some(LiveSource { key: name, epoch });
        }
        // Cleared separately: consulted by both phase 1 and the switch test.
        self.needs_audio_restart = false;

        // Phase 3: spectrum rebuild
        if self.needs_spectrum || rate_changed {
            log::debug!(
                "rebuilding spectrum chain ({} bins at {} fps)",
                self.spectrum_resolution,
                self.spectrum_rate
            );
            self.needs_spectrum = false;
            self.needs_reconnect = true;
            self.build_spectrum_chain()?;
        }

        // Phase 4: receiver rebuild on rate change
        if rate_changed {
            log::info!(
                "input rate changed; rebuilding {} receivers",
                self.receivers.len()
            );
            let keys: Vec<String> = self.receivers.keys().cloned().collect();
            for key in keys {
                self.rebuild_receiver_in_place(&key, None)?;
            }
            self.needs_reconnect = true;
        }

        // Phase 5: source renewal
        if self.needs_reconnect {
            self.renew_source_if_needed()?;
        }

        // Phase 6: reconnect
        if self.needs_reconnect {
            self.needs_reconnect = false;
            self.engine.pause();
            let result = self.rewire();
            // Resume unconditionally; silence is valid output and the
            // graph must never stay paused behind a failed wire.
            self.engine.resume();
            result?;
        }
        Ok(())
    }

    fn tune_hook_for(&self, epoch: u64) -> skywave_ports::TuneHook {
        let mailbox = self.mailbox.clone();
        Box::new(move || {
            mailbox.borrow_mut().push_tune(epoch);
        })
    }

    fn build_spectrum_chain(&mut self) -> Result<(), RadioError> {
        let rate = self.input_rate.ok_or(RadioError::NoActiveSource)?;
        if let Some(old) = self.spectrum.take() {
            self.engine.release(old.stage);
            self.engine.release(old.sink);
        }
        let (frames, _) = broadcast::channel(SPECTRUM_QUEUE_DEPTH);
        let params = SpectrumParams {
            sample_rate: rate,
            resolution: self.spectrum_resolution,
            frame_rate: self.spectrum_rate,
        };
        let stage = self.engine.new_spectrum_stage(&params);
        let sink = self
            .engine
            .new_spectrum_sink(self.spectrum_resolution, frames.clone());
        self.spectrum = Some(SpectrumChain {
            stage,
            sink,
            frames,
        });
        Ok(())
    }

    fn renew_source_if_needed(&mut self) -> Result<(), RadioError> {
        let Some(live) = &self.live else {
            return Ok(());
        };
        let key = live.key.clone();
        let needs = self
            .sources
            .get(&key)
            .map(|s| s.needs_renew())
            .unwrap_or(false);
        if !needs {
            return Ok(());
        }
        log::info!("renewing source {:?}", key);
        self.epoch_counter += 1;
        let epoch = self.epoch_counter;
        let hook = self.tune_hook_for(epoch);
        let source = self
            .sources
            .get_mut(&key)
            .ok_or_else(|| RadioError::UnknownSource(key.clone()))?;
        let mut renewed = source.renew();
        renewed.set_tune_hook(hook);
        *source = renewed;
        self.live = Some(LiveSource { key, epoch });
        Ok(())
    }

    /// Pause, tear down, rewire, resume.
    fn rewire(&mut self) -> Result<(), RadioError> {
        self.engine.disconnect_all();

        let live_key = self
            .live
            .as_ref()
            .map(|l| l.key.clone())
            .ok_or(RadioError::NoActiveSource)?;
        let source_node = self
            .sources
            .get(&live_key)
            .map(|s| s.node())
            .ok_or_else(|| RadioError::UnknownSource(live_key.clone()))?;
        let (stage, sink) = match &self.spectrum {
            Some(chain) => (chain.stage, chain.sink),
            None => {
                return Err(RadioError::Internal(
                    "reconnect without a spectrum chain".to_string(),
                ));
            }
        };

        // Monitoring path is always wired.
        self.engine.connect(source_node.into(), stage.into())?;
        self.engine.connect(stage.into(), sink.into())?;

        // Fresh summing nodes each pass; an adder's input count is fixed
        // once wired.
        if let Some((old_l, old_r)) = self.mixers.take() {
            self.engine.release(old_l);
            self.engine.release(old_r);
        }
        if let Some(old) = self.audio_sink.take() {
            self.engine.release(old);
        }
        let sum_l = self.engine.new_adder();
        let sum_r = self.engine.new_adder();
        self.mixers = Some((sum_l, sum_r));

        let mut mixed: usize = 0;
        let mut skipped: usize = 0;
        for (key, receiver) in self.receivers.iter() {
            let valid = receiver.is_valid();
            self.receiver_valid.insert(key.clone(), valid);
            if !valid {
                continue;
            }
            if mixed >= MAX_MIXED_RECEIVERS {
                skipped += 1;
                continue;
            }
            self.engine
                .connect(source_node.into(), receiver.node().into())?;
            let (out_l, out_r) = receiver.audio_outputs();
            self.engine.connect(out_l, sum_l.port(mixed as u32))?;
            self.engine.connect(out_r, sum_r.port(mixed as u32))?;
            mixed += 1;
        }
        if skipped > 0 {
            log::warn!(
                "refusing to mix more than {} receivers; {} left unconnected",
                MAX_MIXED_RECEIVERS,
                skipped
            );
        }

        if mixed > 0 {
            // Audio output only exists with at least one input; the
            // soundcard sink is recreated every pass.
            let audio_sink = self.engine.new_audio_sink(self.audio_rate);
            self.audio_sink = Some(audio_sink);
            self.engine.connect(sum_l.into(), self.audio_join.port(0))?;
            self.engine.connect(sum_r.into(), self.audio_join.port(1))?;
            self.engine
                .connect(self.audio_join.into(), self.audio_queue_sink.into())?;
            self.engine.connect(sum_l.into(), audio_sink.port(0))?;
            self.engine.connect(sum_r.into(), audio_sink.port(1))?;
        }
        Ok(())
    }

    // ---- receiver lifecycle --------------------------------------------

    fn construct_receiver(
        &mut self,
        mode: Mode,
        template: &Snapshot,
        key: &str,
    ) -> Result<Receiver, RadioError> {
        let ctx = ReceiverContext {
            input_rate: self.input_rate.ok_or(RadioError::NoActiveSource)?,
            input_center_freq: self.input_freq,
            audio_rate: self.audio_rate,
        };
        let facet = ReceiverFacet::new(key.to_string(), self.mailbox.clone());
        let receiver = build_receiver(
            mode,
            template,
            &ctx,
            facet.clone(),
            self.engine.as_mut(),
        )?;
        // Construction and initial state application are done; requests
        // from here on are real.
        facet.enable();
        Ok(receiver)
    }

    fn rebuild_receiver_in_place(
        &mut self,
        key: &str,
        mode: Option<Mode>,
    ) -> Result<(), RadioError> {
        let (old_node, old_mode, state) = {
            let receiver = self
                .receivers
                .get(key)
                .ok_or_else(|| RadioError::UnknownReceiver(key.to_string()))?;
            (receiver.node(), receiver.mode(), receiver.snapshot())
        };
        let mode = mode.unwrap_or(old_mode);
        let built = self.construct_receiver(mode, &state, key)?;
        self.engine.release(old_node);
        self.receivers.insert(key.to_string(), built);
        Ok(())
    }

    fn update_receiver_validity(&mut self, key: &str) {
        let Some(receiver) = self.receivers.get(key) else {
            return;
        };
        let valid = receiver.is_valid();
        if self.receiver_valid.get(key).copied() != Some(valid) {
            self.needs_reconnect = true;
        }
    }

    // ---- mailbox and timers --------------------------------------------

    /// Drain queued facet requests and tune events, then reconcile.
    /// Every mutator ends here.
    fn settle(&mut self) -> Result<(), RadioError> {
        loop {
            let (requests, tunes) = {
                let mut mailbox = self.mailbox.borrow_mut();
                (mailbox.take_requests(), mailbox.take_tunes())
            };
            for epoch in tunes {
                self.schedule_settle(epoch);
            }
            for request in requests {
                self.handle_facet_request(request)?;
            }
            self.reconcile()?;
            if self.mailbox.borrow().is_empty() {
                return Ok(());
            }
        }
    }

    fn schedule_settle(&mut self, epoch: u64) {
        let Some(live) = &self.live else {
            return;
        };
        if live.epoch != epoch {
            return;
        }
        let Some(source) = self.sources.get(&live.key) else {
            return;
        };
        let due = self.clock.now() + source.tune_settling_delay();
        log::debug!("tune detected on {:?}; settle at {:?}", live.key, due);
        self.settle_timers.push(epoch, Reverse(due));
    }

    fn handle_facet_request(&mut self, request: FacetRequest) -> Result<(), RadioError> {
        match request {
            FacetRequest::Revalidate(key) => {
                self.update_receiver_validity(&key);
                Ok(())
            }
            FacetRequest::Rebuild(key) => {
                if self.receivers.contains_key(&key) {
                    self.rebuild_receiver_in_place(&key, None)?;
                    self.needs_reconnect = true;
                }
                Ok(())
            }
            FacetRequest::Replace(key, mode) => {
                if self.receivers.contains_key(&key) {
                    self.rebuild_receiver_in_place(&key, Some(mode))?;
                    self.needs_reconnect = true;
                }
                Ok(())
            }
        }
    }

    /// A tune-settled timer fired. Stale epochs are dropped silently.
    fn tune_settled(&mut self, epoch: u64) -> Result<(), RadioError> {
        let Some(live) = &self.live else {
            return Ok(());
        };
        if live.epoch != epoch {
            log::debug!("dropping stale tune-settled notification");
            return Ok(());
        }
        let key = live.key.clone();
        let freq = match self.sources.get(&key) {
            Some(source) => source.frequency(),
            None => return Ok(()),
        };
        log::debug!("tune settled on {:?} at {} Hz", key, freq);
        self.input_freq = freq;
        let keys: Vec<String> = self.receivers.keys().cloned().collect();
        for key in keys {
            if let Some(receiver) = self.receivers.get_mut(&key) {
                receiver.set_input_center_freq(freq);
            }
            self.update_receiver_validity(&key);
        }
        Ok(())
    }
}

impl ExportedState for Radio {
    fn state_def(&self, def: &mut StateDef) {
        def.writable("running", Constraint::Boolean);
        def.writable(
            "source_name",
            Constraint::enumeration(self.sources.iter().map(|(k, s)| (k.clone(), s.label()))),
        );
        def.read_only("input_rate", Constraint::Integer);
        def.read_only("audio_rate", Constraint::Integer);
        def.writable("spectrum_resolution", Constraint::int_range(2, 4096, true));
        def.writable("spectrum_rate", Constraint::float_range(1.0, 60.0, true));
        def.read_only("spectrum_fft", Constraint::SpectrumStream);
        def.block("sources");
        def.block("receivers");
        def.read_only("cpu_use", Constraint::Float);
    }

    fn state_table(&self) -> &StateDef {
        self.table.get_or_declare(self)
    }

    fn cell_get(&self, name: &str) -> Result<Value, StateError> {
        match name {
            "running" => Ok(json!(self.running)),
            "source_name" => Ok(json!(self.source_name)),
            "input_rate" => Ok(json!(self.input_rate.unwrap_or(0.0) as i64)),
            "audio_rate" => Ok(json!(self.audio_rate)),
            "spectrum_resolution" => Ok(json!(self.spectrum_resolution)),
            "spectrum_rate" => Ok(json!(self.spectrum_rate)),
            "spectrum_fft" => Ok(json!({
                "center_freq": self.input_freq,
                "resolution": self.spectrum_resolution,
                "frame_rate": self.spectrum_rate,
            })),
            "cpu_use" => Ok(json!(self.cpu_use())),
            _ => Err(StateError::UnknownProperty(name.to_string())),
        }
    }

    fn cell_set(&mut self, name: &str, value: Value) -> Result<(), StateError> {
        match name {
            "running" => {
                let running = value.as_bool().unwrap_or(false);
                self.set_running(running).map_err(StateError::from)
            }
            "source_name" => {
                let key = value.as_str().unwrap_or_default().to_string();
                self.select_source(&key).map_err(StateError::from)
            }
            "spectrum_resolution" => {
                let resolution = value.as_u64().unwrap_or(0) as u32;
                self.set_spectrum_resolution(resolution)
                    .map_err(StateError::from)
            }
            "spectrum_rate" => {
                let rate = value.as_f64().unwrap_or(0.0);
                self.set_spectrum_rate(rate).map_err(StateError::from)
            }
            _ => Err(StateError::UnknownProperty(name.to_string())),
        }
    }

    fn child(&self, name: &str) -> Option<&dyn ExportedState> {
        match name {
            "sources" => Some(&self.sources),
            "receivers" => Some(&self.receivers),
            _ => None,
        }
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut dyn ExportedState> {
        match name {
            "sources" => Some(&mut self.sources),
            "receivers" => Some(&mut self.receivers),
            _ => None,
        }
    }

    fn apply_child(&mut self, name: &str, value: &Value) -> Result<(), StateError> {
        let nested = value
            .as_object()
            .ok_or_else(|| StateError::NotAnObject(name.to_string()))?;
        match name {
            // Dynamic membership: route into existing receivers, create
            // the missing ones from their serialized description.
            "receivers" => {
                for (key, child_value) in nested {
                    let child_snap = child_value
                        .as_object()
                        .ok_or_else(|| StateError::NotAnObject(key.clone()))?;
                    if self.receivers.contains_key(key) {
                        if let Some(receiver) = self.receivers.get_mut(key) {
                            receiver
                                .apply(child_snap)
                                .map_err(|e| StateError::at(key, e))?;
                        }
                    } else {
                        let tag = child_snap
                            .get("mode")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default();
                        let mode = parse_mode(tag)
                            .map_err(|e| StateError::at(key, StateError::Failed(e.to_string())))?;
                        self.add_receiver(mode, Some(key.as_str()), Some(child_snap))
                            .map_err(|e| StateError::at(key, e.into()))?;
                    }
                }
                Ok(())
            }
            _ => match self.child_mut(name) {
                Some(child) => child.apply(nested),
                None => Err(StateError::UnknownProperty(name.to_string())),
            },
        }
    }
}
