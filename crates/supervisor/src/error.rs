//! Supervisor error types

use contracts::SupervisorState;
use launcher::LaunchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Operation not allowed in the current state
    #[error("supervisor is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: SupervisorState,
        actual: SupervisorState,
    },

    /// `start` was already called
    #[error("pipeline already started")]
    AlreadyStarted,

    /// A process stage could not be started
    #[error(transparent)]
    Launch(#[from] LaunchError),
}
