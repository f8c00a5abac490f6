//! Error types for the receiver crate

use skywave_ports::GraphError;
use skywave_state::StateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReceiverError {
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
}
