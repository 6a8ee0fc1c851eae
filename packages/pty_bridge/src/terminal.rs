use pty_core::{NativePty, PtyConfig, PtyCore, Signal};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::BridgeStrategy;
use crate::error::BridgeError;
use crate::exit::{ExitCode, ExitSignal};
use crate::output::{OutputHub, TextStream};
use crate::polling::PollingBridge;
use crate::session::ReadPath;
use crate::state::{BridgeState, SessionState};
use crate::worker::WorkerBridge;

enum Bridge {
    Polling(PollingBridge),
    Worker(WorkerBridge),
}

/// A child process on a pseudo-terminal, exposed as an async text stream
/// plus an exit code.
///
/// Writes, resizes and kills go straight to the device. Output travels
/// through whichever bridge was chosen at construction and is decoded to
/// UTF-8 before it reaches subscribers. Must be created from within a tokio
/// runtime, otherwise construction fails with [`BridgeError::NoRuntime`].
/// Dropping it stops the bridge.
pub struct PseudoTerminal {
    device: Arc<dyn PtyCore>,
    strategy: BridgeStrategy,
    bridge: Bridge,
    hub: OutputHub,
    exit: ExitCode,
    state: SessionState,
}

impl PseudoTerminal {
    /// Spawn `config.command` on a native PTY
    pub fn spawn(config: PtyConfig, strategy: BridgeStrategy) -> Result<Self, BridgeError> {
        require_runtime()?;
        let device = NativePty::spawn(config)?;
        Self::with_device(Arc::new(device), strategy)
    }

    /// Bridge an already running device
    pub fn with_device(
        device: Arc<dyn PtyCore>,
        strategy: BridgeStrategy,
    ) -> Result<Self, BridgeError> {
        require_runtime()?;
        let hub = OutputHub::new();
        let (exit_signal, exit) = ExitSignal::channel();
        let state = SessionState::new();
        let read_path = ReadPath::new(hub.clone(), exit_signal, state.clone());

        let bridge = match strategy {
            BridgeStrategy::Polling { interval } => {
                Bridge::Polling(PollingBridge::start(device.clone(), read_path, interval))
            }
            BridgeStrategy::Worker { sync_processed } => Bridge::Worker(WorkerBridge::start(
                device.clone(),
                read_path,
                sync_processed,
            )?),
        };
        info!(
            "PTY session started ({:?}, pid {:?})",
            strategy,
            device.pid()
        );

        Ok(Self {
            device,
            strategy,
            bridge,
            hub,
            exit,
            state,
        })
    }

    /// Send text to the terminal's input
    pub fn write(&self, text: &str) -> Result<(), BridgeError> {
        self.write_bytes(text.as_bytes())
    }

    pub fn write_bytes(&self, data: &[u8]) -> Result<(), BridgeError> {
        self.device.write(data)?;
        Ok(())
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), BridgeError> {
        debug!("Resizing PTY to {}x{}", cols, rows);
        self.device.resize(cols, rows)?;
        Ok(())
    }

    /// Returns whether the device accepted the signal. The session keeps
    /// running until the device itself reports exit.
    pub fn kill(&self, signal: Signal) -> bool {
        self.device.kill(signal)
    }

    /// Subscribe to decoded output. Chunks published before this call are
    /// not replayed, so subscribe right after construction to see
    /// everything.
    pub fn subscribe(&self) -> TextStream {
        self.hub.subscribe()
    }

    pub fn exit_code(&self) -> ExitCode {
        self.exit.clone()
    }

    /// Acknowledge the last received text chunk. Required after every chunk
    /// when the session uses an ack-gated worker, otherwise a no-op.
    ///
    /// Exactly one ack per chunk: with several subscribers, only one of
    /// them should call this. Acks that arrive while the worker is still
    /// reading the next chunk are discarded.
    pub fn ack_processed(&self) {
        match &self.bridge {
            Bridge::Worker(worker) => worker.ack(),
            Bridge::Polling(_) => {}
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state.current()
    }

    /// Resolves once the output stream has closed
    pub async fn wait_closed(&self) {
        self.state.wait_for(BridgeState::Closed).await;
    }

    pub fn strategy(&self) -> BridgeStrategy {
        self.strategy
    }

    pub fn pid(&self) -> Option<u32> {
        self.device.pid()
    }
}

// Both bridges spawn tokio tasks, which panics outside a runtime
fn require_runtime() -> Result<(), BridgeError> {
    tokio::runtime::Handle::try_current()
        .map(|_| ())
        .map_err(|_| BridgeError::NoRuntime)
}

impl Drop for PseudoTerminal {
    fn drop(&mut self) {
        match &self.bridge {
            Bridge::Polling(polling) => polling.stop(),
            Bridge::Worker(worker) => worker.stop(),
        }
    }
}
