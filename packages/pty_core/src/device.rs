use crate::error::PtyError;
use crate::signal::Signal;

/// The primitives a bridge needs from a pseudo-terminal device.
///
/// Implementations own the pty and the child process. Reads come in two
/// flavours so a caller can pick the scheduling model that suits it:
/// `read_non_blocking` for a cooperative poller and `read_blocking` for a
/// dedicated worker thread. A single session only ever uses one of them.
pub trait PtyCore: Send + Sync {
    /// Returns immediately. `Ok(None)` means no data is available right now.
    fn read_non_blocking(&self) -> Result<Option<Vec<u8>>, PtyError>;

    /// Blocks until data arrives. `Ok(None)` means the process has exited
    /// and no more data will come.
    fn read_blocking(&self) -> Result<Option<Vec<u8>>, PtyError>;

    /// Non-blocking exit check, `Ok(None)` while the process is running.
    fn exit_code_non_blocking(&self) -> Result<Option<i32>, PtyError>;

    /// Blocks until the process exits.
    fn exit_code_blocking(&self) -> Result<i32, PtyError>;

    fn write(&self, data: &[u8]) -> Result<(), PtyError>;

    fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError>;

    /// Returns whether the signal was accepted for delivery.
    fn kill(&self, signal: Signal) -> bool;

    fn pid(&self) -> Option<u32> {
        None
    }
}
