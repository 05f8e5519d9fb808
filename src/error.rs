use thiserror::Error;
use tokio::task::JoinError;

use crate::abstractions::process::ProcessError;

/// Setup problems. Raised before any process starts; a ring that fails
/// validation never runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("ring needs at least 2 processes, got {size}")]
    RingTooSmall { size: usize },

    #[error("identifier {id} appears more than once")]
    DuplicateIdentifier { id: String },

    #[error("identifier {id} is not a positive integer")]
    InvalidIdentifier { id: String },

    #[error("cannot draw {requested} unique identifiers from {available} candidates")]
    TooManyProcesses { requested: usize, available: usize },

    #[error("mismatched channel wiring: {reason}")]
    MismatchedWiring { reason: String },
}

#[derive(Debug, Error)]
pub enum ElectionError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("process task failed: {0}")]
    Join(#[from] JoinError),
}
