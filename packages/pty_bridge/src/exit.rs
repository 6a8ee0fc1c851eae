use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

use crate::error::BridgeError;

/// Exit code reported when the read path ends without the device ever
/// reporting one, e.g. a worker thread that died.
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Resolving half of a session's exit code. The first resolution wins.
#[derive(Clone)]
pub struct ExitSignal {
    tx: Arc<watch::Sender<Option<i32>>>,
}

impl ExitSignal {
    pub fn channel() -> (Self, ExitCode) {
        let (tx, rx) = watch::channel(None);
        (Self { tx: Arc::new(tx) }, ExitCode { rx })
    }

    pub fn resolve(&self, code: i32) -> Result<(), BridgeError> {
        let resolved = self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(code);
            true
        });
        if resolved {
            return Ok(());
        }

        let existing = (*self.tx.borrow()).unwrap_or(UNKNOWN_EXIT_CODE);
        warn!(existing, rejected = code, "exit code resolved twice");
        Err(BridgeError::ExitAlreadyResolved {
            existing,
            rejected: code,
        })
    }

    pub fn is_resolved(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

/// Awaitable exit code of a terminal session. Clones observe the same value.
#[derive(Clone, Debug)]
pub struct ExitCode {
    rx: watch::Receiver<Option<i32>>,
}

impl ExitCode {
    /// Wait for the process to exit. Resolves to [`UNKNOWN_EXIT_CODE`] if
    /// the session was torn down without an exit code.
    pub async fn wait(&self) -> i32 {
        let mut rx = self.rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(code) => (*code).unwrap_or(UNKNOWN_EXIT_CODE),
            Err(_) => UNKNOWN_EXIT_CODE,
        }
    }

    pub fn try_get(&self) -> Option<i32> {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_resolution_wins() {
        let (signal, exit) = ExitSignal::channel();
        assert_eq!(exit.try_get(), None);

        signal.resolve(0).unwrap();
        let err = signal.resolve(9).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ExitAlreadyResolved {
                existing: 0,
                rejected: 9
            }
        ));

        assert!(signal.is_resolved());
        assert_eq!(exit.wait().await, 0);
        assert_eq!(exit.try_get(), Some(0));
    }

    #[tokio::test]
    async fn waiters_registered_before_resolution_wake() {
        let (signal, exit) = ExitSignal::channel();
        let waiter = tokio::spawn({
            let exit = exit.clone();
            async move { exit.wait().await }
        });

        tokio::task::yield_now().await;
        signal.resolve(42).unwrap();
        assert_eq!(waiter.await.unwrap(), 42);
    }

    #[test]
    fn wait_is_pending_until_resolved() {
        let (signal, exit) = ExitSignal::channel();
        let mut wait = tokio_test::task::spawn(exit.wait());
        tokio_test::assert_pending!(wait.poll());

        signal.resolve(3).unwrap();
        assert!(wait.is_woken());
        tokio_test::assert_ready_eq!(wait.poll(), 3);
    }

    #[tokio::test]
    async fn dropped_signal_yields_unknown() {
        let (signal, exit) = ExitSignal::channel();
        drop(signal);
        assert_eq!(exit.wait().await, UNKNOWN_EXIT_CODE);
    }
}
