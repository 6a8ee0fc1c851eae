use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::BridgeError;

/// Lifecycle of a session's read path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BridgeState {
    Idle,
    Running,
    /// The device reported exit; remaining bytes are being flushed
    Draining,
    Closed,
}

impl BridgeState {
    pub fn can_advance_to(self, next: BridgeState) -> bool {
        matches!(
            (self, next),
            (BridgeState::Idle, BridgeState::Running)
                | (BridgeState::Running, BridgeState::Draining)
                | (BridgeState::Draining, BridgeState::Closed)
        )
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BridgeState::Idle => "idle",
            BridgeState::Running => "running",
            BridgeState::Draining => "draining",
            BridgeState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Shared, observable [`BridgeState`]. Only the read path advances it.
#[derive(Clone)]
pub struct SessionState {
    tx: Arc<watch::Sender<BridgeState>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(BridgeState::Idle);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> BridgeState {
        *self.tx.borrow()
    }

    pub fn advance(&self, next: BridgeState) -> Result<(), BridgeError> {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|current| {
            if current.can_advance_to(next) {
                debug!("bridge state {} -> {}", current, next);
                *current = next;
                true
            } else {
                outcome = Err(BridgeError::InvalidTransition {
                    from: *current,
                    to: next,
                });
                false
            }
        });
        outcome
    }

    /// Move to [`BridgeState::Closed`] from any state except `Closed`
    /// itself. A read path that ends out of order must still close, or
    /// anyone waiting for it would wait forever.
    pub fn close(&self) -> Result<(), BridgeError> {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|current| {
            if *current == BridgeState::Closed {
                outcome = Err(BridgeError::InvalidTransition {
                    from: BridgeState::Closed,
                    to: BridgeState::Closed,
                });
                return false;
            }
            if *current != BridgeState::Draining {
                warn!("bridge state {} -> closed, skipping draining", current);
            }
            *current = BridgeState::Closed;
            true
        });
        outcome
    }

    pub async fn wait_for(&self, target: BridgeState) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|state| *state == target).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_lifecycle_in_order() {
        let state = SessionState::new();
        assert_eq!(state.current(), BridgeState::Idle);

        state.advance(BridgeState::Running).unwrap();
        state.advance(BridgeState::Draining).unwrap();
        state.advance(BridgeState::Closed).unwrap();
        assert_eq!(state.current(), BridgeState::Closed);
    }

    #[test]
    fn cannot_skip_draining() {
        let state = SessionState::new();
        state.advance(BridgeState::Running).unwrap();

        let err = state.advance(BridgeState::Closed).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::InvalidTransition {
                from: BridgeState::Running,
                to: BridgeState::Closed
            }
        ));
        assert_eq!(state.current(), BridgeState::Running);
    }

    #[test]
    fn closed_is_final() {
        for next in [
            BridgeState::Idle,
            BridgeState::Running,
            BridgeState::Draining,
            BridgeState::Closed,
        ] {
            assert!(!BridgeState::Closed.can_advance_to(next));
        }
    }

    #[test]
    fn close_is_reachable_from_any_open_state() {
        for path in [
            &[][..],
            &[BridgeState::Running][..],
            &[BridgeState::Running, BridgeState::Draining][..],
        ] {
            let state = SessionState::new();
            for next in path {
                state.advance(*next).unwrap();
            }
            state.close().unwrap();
            assert_eq!(state.current(), BridgeState::Closed);
        }
    }

    #[test]
    fn close_twice_is_rejected() {
        let state = SessionState::new();
        state.close().unwrap();
        assert!(matches!(
            state.close().unwrap_err(),
            BridgeError::InvalidTransition {
                from: BridgeState::Closed,
                to: BridgeState::Closed
            }
        ));
    }

    #[tokio::test]
    async fn wait_for_observes_transition() {
        let state = SessionState::new();
        let waiter = tokio::spawn({
            let state = state.clone();
            async move { state.wait_for(BridgeState::Running).await }
        });

        state.advance(BridgeState::Running).unwrap();
        waiter.await.unwrap();
    }
}
