//! Engine error types.

use thiserror::Error;
use vouch_kernel::KernelError;
use vouch_validator::ValidatorError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while driving the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The command was not legal in the submission's or release's state.
    #[error("precondition failed: {0}")]
    Kernel(#[from] KernelError),

    /// A validation run failed for reasons other than the data.
    #[error("validator error: {0}")]
    Validator(#[from] ValidatorError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker {id}: {source}")]
    Spawn { id: usize, source: std::io::Error },

    /// Engine shut down; no new validations are accepted.
    #[error("engine shut down")]
    Shutdown,

    /// Internal invariant broken.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        EngineError::Internal(message.into())
    }

    /// True when the request was refused by the state machine, as opposed to
    /// an engine failure.
    pub fn is_precondition(&self) -> bool {
        matches!(self, EngineError::Kernel(_))
    }
}
