/// Errors raised by a pseudo-terminal device
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    /// Failed to open the PTY or spawn the child
    #[error("Failed to create PTY: {0}")]
    CreateFailed(String),
    /// Failed to write to the PTY
    #[error("Failed to write to PTY: {0}")]
    WriteFailed(String),
    /// Failed to read from the PTY
    #[error("Failed to read from PTY: {0}")]
    ReadFailed(String),
    /// Failed to resize the PTY
    #[error("Failed to resize PTY: {0}")]
    ResizeFailed(String),
    /// Failed to deliver a signal
    #[error("Failed to kill PTY: {0}")]
    KillFailed(String),
    /// Failed to collect the child's exit status
    #[error("Failed to wait for PTY process: {0}")]
    WaitFailed(String),
    /// PTY process has exited
    #[error("PTY process has exited")]
    ProcessExited,
    #[error("Unsupported signal: {0}")]
    UnsupportedSignal(String),
}

impl From<anyhow::Error> for PtyError {
    fn from(err: anyhow::Error) -> Self {
        PtyError::CreateFailed(err.to_string())
    }
}
