//! Per-receiver orchestrator capability

use skywave_ports::{ControlHook, Mode};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// A receiver's request against the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FacetRequest {
    Revalidate(String),
    Rebuild(String),
    Replace(String, Mode),
}

/// Single-threaded request queue shared by the orchestrator, its facets,
/// and the tune hooks it registers on sources.
#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    requests: VecDeque<FacetRequest>,
    tune_events: VecDeque<u64>,
}

impl Mailbox {
    pub(crate) fn push_request(&mut self, request: FacetRequest) {
        self.requests.push_back(request);
    }

    pub(crate) fn push_tune(&mut self, epoch: u64) {
        self.tune_events.push_back(epoch);
    }

    pub(crate) fn take_requests(&mut self) -> VecDeque<FacetRequest> {
        std::mem::take(&mut self.requests)
    }

    pub(crate) fn take_tunes(&mut self) -> VecDeque<u64> {
        std::mem::take(&mut self.tune_events)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.tune_events.is_empty()
    }
}

/// Capability handed to one receiver.
///
/// Disabled until the receiver's construction and initial state
/// application complete; until then every call is a silent no-op, so
/// initialization-triggered requests never reenter the orchestrator
/// mid-construction. Enabled calls are queued and drained by the
/// orchestrator before the triggering mutation returns.
pub struct ReceiverFacet {
    key: String,
    enabled: Cell<bool>,
    mailbox: Rc<RefCell<Mailbox>>,
}

impl ReceiverFacet {
    pub(crate) fn new(key: String, mailbox: Rc<RefCell<Mailbox>>) -> Rc<Self> {
        Rc::new(ReceiverFacet {
            key,
            enabled: Cell::new(false),
            mailbox,
        })
    }

    pub(crate) fn enable(&self) {
        self.enabled.set(true);
    }

    fn post(&self, request: FacetRequest) {
        if !self.enabled.get() {
            log::trace!("dropping facet call for {:?} before enablement", self.key);
            return;
        }
        self.mailbox.borrow_mut().push_request(request);
    }
}

impl ControlHook for ReceiverFacet {
    fn revalidate(&self) {
        self.post(FacetRequest::Revalidate(self.key.clone()));
    }

    fn rebuild(&self) {
        self.post(FacetRequest::Rebuild(self.key.clone()));
    }

    fn replace(&self, mode: Mode) {
        self.post(FacetRequest::Replace(self.key.clone(), mode));
    }
}
