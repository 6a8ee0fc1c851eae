use pty_core::PtyCore;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{self, Bootstrap, Control, ControlSender, EventSender, WorkerEvent, WorkerPort};
use crate::error::BridgeError;
use crate::exit::UNKNOWN_EXIT_CODE;
use crate::session::ReadPath;

/// Worker bridge: a dedicated OS thread loops on the device's blocking read
/// and forwards raw bytes to an owner task that decodes and publishes them.
///
/// With `sync_processed`, the worker does not start the next read until the
/// consumer calls [`WorkerBridge::ack`] for the last chunk it was given.
/// A consumer that never acks stalls the worker for good; that is the
/// throttle.
pub(crate) struct WorkerBridge {
    sync_processed: bool,
    control: Arc<OnceLock<ControlSender>>,
    owner: JoinHandle<()>,
}

impl WorkerBridge {
    pub(crate) fn start(
        device: Arc<dyn PtyCore>,
        read_path: ReadPath,
        sync_processed: bool,
    ) -> Result<Self, BridgeError> {
        let (worker_bootstrap, owner_bootstrap) = channel::bootstrap();

        std::thread::Builder::new()
            .name("pty-bridge-worker".to_string())
            .spawn(move || run_worker(device, worker_bootstrap, sync_processed))
            .map_err(|e| BridgeError::WorkerSpawn(e.to_string()))?;

        read_path.start();
        let control = Arc::new(OnceLock::new());
        let owner = tokio::spawn(run_owner(
            owner_bootstrap,
            read_path,
            control.clone(),
            sync_processed,
        ));

        Ok(Self {
            sync_processed,
            control,
            owner,
        })
    }

    /// Tell the worker the last delivered chunk has been processed. A no-op
    /// unless the bridge is ack-gated.
    pub(crate) fn ack(&self) {
        if !self.sync_processed {
            return;
        }
        match self.control.get() {
            Some(control) => {
                if control.send(Control::Ack).is_err() {
                    debug!("ack after worker exit ignored");
                }
            }
            None => debug!("ack before worker handshake ignored"),
        }
    }

    /// Stop the owner task. The worker thread ends on its next send, or
    /// when the device reports exit.
    pub(crate) fn stop(&self) {
        self.owner.abort();
    }
}

fn run_worker(device: Arc<dyn PtyCore>, bootstrap: EventSender, sync_processed: bool) {
    let Some(mut port) = WorkerPort::connect(bootstrap) else {
        warn!("PTY worker owner went away before handshake");
        return;
    };
    info!(sync_processed, "PTY worker started");

    loop {
        let chunk = device.read_blocking().unwrap_or_else(|e| {
            warn!("Error reading PTY output: {}", e);
            None
        });
        let Some(bytes) = chunk else {
            let code = device.exit_code_blocking().unwrap_or_else(|e| {
                warn!("Failed to collect PTY exit code: {}", e);
                UNKNOWN_EXIT_CODE
            });
            port.send(WorkerEvent::ExitCode(code));
            break;
        };

        // Acks that arrived during the read belong to an earlier chunk
        port.absorb_pending();
        if !port.send(WorkerEvent::Data(bytes)) {
            debug!("PTY worker owner dropped");
            break;
        }
        // Gate stays closed until the owner acks
        if sync_processed && !port.wait_for_ack() {
            debug!("PTY worker owner dropped while waiting for ack");
            break;
        }
    }

    info!("PTY worker exiting");
}

async fn run_owner(
    bootstrap: Bootstrap,
    mut read_path: ReadPath,
    control: Arc<OnceLock<ControlSender>>,
    sync_processed: bool,
) {
    let Some(mut channel) = bootstrap.accept().await else {
        warn!("PTY worker vanished before handshake");
        read_path.finish(UNKNOWN_EXIT_CODE);
        return;
    };
    let _ = control.set(channel.control());

    while let Some(event) = channel.recv().await {
        match event {
            WorkerEvent::Data(bytes) => {
                let published = read_path.ingest(&bytes);
                // Nothing reached the consumer, so nobody else will ack
                if sync_processed && !published {
                    channel.ack();
                }
            }
            WorkerEvent::ExitCode(code) => {
                read_path.finish(code);
                return;
            }
            WorkerEvent::Ready(_) => warn!("ignoring repeated worker handshake"),
        }
    }

    warn!("PTY worker channel closed without an exit code");
    read_path.finish(UNKNOWN_EXIT_CODE);
}
