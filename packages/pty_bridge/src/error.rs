use pty_core::PtyError;

use crate::state::BridgeState;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Pty(#[from] PtyError),

    #[error("exit code already resolved to {existing}, rejected {rejected}")]
    ExitAlreadyResolved { existing: i32, rejected: i32 },

    #[error("invalid bridge transition: {from} -> {to}")]
    InvalidTransition { from: BridgeState, to: BridgeState },

    #[error("failed to start PTY worker: {0}")]
    WorkerSpawn(String),

    #[error("PTY sessions must be started inside a tokio runtime")]
    NoRuntime,
}
