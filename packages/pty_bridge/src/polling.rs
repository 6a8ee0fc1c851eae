use pty_core::PtyCore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::exit::UNKNOWN_EXIT_CODE;
use crate::session::ReadPath;

/// Cooperative bridge: a repeating timer task drains the device's
/// non-blocking read primitive. Every tick runs to completion without
/// yielding, so the device must never block here.
pub(crate) struct PollingBridge {
    task: JoinHandle<()>,
}

impl PollingBridge {
    pub(crate) fn start(
        device: Arc<dyn PtyCore>,
        read_path: ReadPath,
        interval: Duration,
    ) -> Self {
        read_path.start();
        info!("Starting polling bridge every {:?}", interval);
        let task = tokio::spawn(poll_loop(device, read_path, interval));
        Self { task }
    }

    pub(crate) fn stop(&self) {
        self.task.abort();
    }

    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn poll_loop(device: Arc<dyn PtyCore>, mut read_path: ReadPath, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Some(code) = tick(device.as_ref(), &mut read_path) {
            // Output queued before the exit was observed still belongs to
            // the session
            drain(device.as_ref(), &mut read_path);
            read_path.finish(code);
            break;
        }
    }
    debug!("polling bridge stopped");
}

/// One timer tick. Returns the exit code once the process has exited.
fn tick(device: &dyn PtyCore, read_path: &mut ReadPath) -> Option<i32> {
    match device.exit_code_non_blocking() {
        Ok(Some(code)) => return Some(code),
        Ok(None) => {}
        Err(e) => {
            warn!("Exit check failed, closing session: {}", e);
            return Some(UNKNOWN_EXIT_CODE);
        }
    }
    drain(device, read_path);
    None
}

fn drain(device: &dyn PtyCore, read_path: &mut ReadPath) {
    loop {
        match device.read_non_blocking() {
            Ok(Some(bytes)) => {
                read_path.ingest(&bytes);
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading PTY output: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::{ExitCode, ExitSignal};
    use crate::output::{OutputHub, TextStream};
    use crate::state::{BridgeState, SessionState};
    use crate::testing::{FakePty, init_tracing};

    fn start(fake: Arc<FakePty>) -> (PollingBridge, TextStream, ExitCode, SessionState) {
        init_tracing();
        let hub = OutputHub::new();
        let out = hub.subscribe();
        let (exit, code) = ExitSignal::channel();
        let state = SessionState::new();
        let read_path = ReadPath::new(hub, exit, state.clone());
        let bridge = PollingBridge::start(fake, read_path, Duration::from_millis(10));
        (bridge, out, code, state)
    }

    #[tokio::test(start_paused = true)]
    async fn exit_without_output_closes_empty_stream() {
        let fake = Arc::new(
            FakePty::new()
                .with_non_blocking_reads([None, None])
                .exit_after_checks(2)
                .with_exit_code(0),
        );
        let (bridge, mut out, code, state) = start(fake.clone());

        assert_eq!(code.wait().await, 0);
        assert_eq!(out.recv().await, None);
        assert_eq!(state.current(), BridgeState::Closed);
        assert_eq!(fake.exit_checks(), 3);

        tokio::task::yield_now().await;
        assert!(bridge.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn drains_all_available_chunks_each_tick() {
        let fake = Arc::new(
            FakePty::new()
                .with_non_blocking_reads([
                    Some(b"one ".to_vec()),
                    Some(vec![0xE4, 0xBD]),
                    Some(vec![0xA0]),
                    None,
                ])
                .exit_after_checks(1)
                .with_exit_code(3),
        );
        let (_bridge, mut out, code, _state) = start(fake.clone());

        assert_eq!(out.recv().await.as_deref(), Some("one "));
        assert_eq!(out.recv().await.as_deref(), Some("你"));
        assert_eq!(out.recv().await, None);
        assert_eq!(code.wait().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn output_queued_at_exit_is_not_lost() {
        let fake = Arc::new(FakePty::new().exit_after_checks(1).with_exit_code(1));
        let (_bridge, mut out, code, _state) = start(fake.clone());

        // First tick has run; queue output that races with the exit
        tokio::task::yield_now().await;
        fake.push_non_blocking(b"last words".to_vec());

        assert_eq!(out.recv().await.as_deref(), Some("last words"));
        assert_eq!(out.recv().await, None);
        assert_eq!(code.wait().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_repeat_until_exit() {
        let fake = Arc::new(FakePty::new().exit_after_checks(5));
        let (_bridge, _out, code, _state) = start(fake.clone());

        assert_eq!(code.wait().await, 0);
        assert_eq!(fake.exit_checks(), 6);
        // One empty read per live tick, plus the drain at exit
        assert_eq!(fake.non_blocking_reads(), 5 + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_the_timer() {
        let fake = Arc::new(FakePty::new().exit_after_checks(usize::MAX));
        let (bridge, mut out, code, state) = start(fake.clone());

        tokio::time::sleep(Duration::from_millis(35)).await;
        bridge.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let checks = fake.exit_checks();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(fake.exit_checks(), checks);
        assert!(bridge.is_finished());
        assert_eq!(out.recv().await, None);
        assert_eq!(code.wait().await, UNKNOWN_EXIT_CODE);
        assert_eq!(state.current(), BridgeState::Running);
    }
}
