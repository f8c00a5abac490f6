//! Error types for the orchestrator

use skywave_ports::GraphError;
use skywave_receiver::ReceiverError;
use skywave_state::StateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RadioError {
    #[error("source does not exist: {0}")]
    UnknownSource(String),

    #[error("receiver does not exist: {0}")]
    UnknownReceiver(String),

    #[error("receiver key already in use: {0}")]
    DuplicateReceiverKey(String),

    #[error("refusing to create more than 100 receivers")]
    ReceiverLimit,

    #[error("no active source")]
    NoActiveSource,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("receiver error: {0}")]
    Receiver(#[from] ReceiverError),
}

pub type Result<T> = std::result::Result<T, RadioError>;

impl From<RadioError> for StateError {
    fn from(err: RadioError) -> StateError {
        match err {
            RadioError::State(inner) => inner,
            other => StateError::Failed(other.to_string()),
        }
    }
}
