//! Async driver for the orchestrator's timers
//!
//! The control plane is single-threaded; the session loop is its only
//! suspension point, sleeping until the next tune-settled timer is due
//! and firing it on the control context.

use crate::{Radio, RadioError};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Poll interval while no timer is pending.
const IDLE_TICK: Duration = Duration::from_millis(200);

pub struct Session {
    radio: Rc<RefCell<Radio>>,
}

impl Session {
    pub fn new(radio: Radio) -> Self {
        Session {
            radio: Rc::new(RefCell::new(radio)),
        }
    }

    /// Shared handle to the orchestrator, for the transport layer.
    pub fn radio(&self) -> &Rc<RefCell<Radio>> {
        &self.radio
    }

    /// Drive pending tune-settled timers until the task is dropped.
    pub async fn run(&self) -> Result<(), RadioError> {
        loop {
            let wait = {
                let radio = self.radio.borrow();
                match radio.next_timer_due() {
                    Some(due) => due.saturating_sub(radio.now()),
                    None => IDLE_TICK,
                }
            };
            tokio::time::sleep(wait).await;
            self.radio.borrow_mut().poll_timers()?;
        }
    }
}
