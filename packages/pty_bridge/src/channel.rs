//! Typed, ordered message channel between a worker thread and its owner.
//!
//! The worker announces its own control address with [`WorkerEvent::Ready`]
//! and then waits for a [`Control::Port`] telling it where to publish
//! events. From then on events flow owner-ward and control messages
//! worker-ward, each direction in send order. Payloads are moved through
//! the channel, never shared.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

pub type ControlSender = UnboundedSender<Control>;
pub type EventSender = UnboundedSender<WorkerEvent>;

/// Owner -> worker
#[derive(Debug)]
pub enum Control {
    /// Where the worker should send its events from now on
    Port(EventSender),
    /// The consumer finished with the last delivered chunk
    Ack,
}

/// Worker -> owner
#[derive(Debug)]
pub enum WorkerEvent {
    /// Handshake: the address the owner should send control messages to
    Ready(ControlSender),
    /// One raw device read
    Data(Vec<u8>),
    /// Terminal event; nothing follows it
    ExitCode(i32),
}

/// Create the bootstrap link handed to a new worker. The sender goes to the
/// worker, the [`Bootstrap`] stays with the owner.
pub fn bootstrap() -> (EventSender, Bootstrap) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Bootstrap { rx })
}

/// Owner's end of the link before the handshake completes
pub struct Bootstrap {
    rx: UnboundedReceiver<WorkerEvent>,
}

impl Bootstrap {
    /// Wait for the worker to announce itself and hand it a fresh event
    /// channel. Returns `None` if the worker went away first.
    pub async fn accept(mut self) -> Option<WorkerChannel> {
        match self.rx.recv().await? {
            WorkerEvent::Ready(control) => {
                let (events_tx, events) = mpsc::unbounded_channel();
                control.send(Control::Port(events_tx)).ok()?;
                debug!("worker handshake complete");
                Some(WorkerChannel { control, events })
            }
            other => {
                warn!("worker sent {:?} before its handshake", other);
                None
            }
        }
    }
}

/// Owner's end of an established worker link
pub struct WorkerChannel {
    control: ControlSender,
    events: UnboundedReceiver<WorkerEvent>,
}

impl WorkerChannel {
    pub async fn recv(&mut self) -> Option<WorkerEvent> {
        self.events.recv().await
    }

    pub fn ack(&self) -> bool {
        self.control.send(Control::Ack).is_ok()
    }

    pub fn control(&self) -> ControlSender {
        self.control.clone()
    }
}

/// Worker's end of the link. All receives block, so this must only be used
/// from a plain OS thread, never from inside an async runtime.
pub struct WorkerPort {
    inbound: UnboundedReceiver<Control>,
    outbound: EventSender,
}

impl WorkerPort {
    /// Announce this worker over `bootstrap` and block until the owner
    /// replies with a `Port`.
    pub fn connect(bootstrap: EventSender) -> Option<Self> {
        let (control_tx, mut inbound) = mpsc::unbounded_channel();
        bootstrap.send(WorkerEvent::Ready(control_tx)).ok()?;
        loop {
            match inbound.blocking_recv()? {
                Control::Port(outbound) => return Some(Self { inbound, outbound }),
                Control::Ack => debug!("ignoring ack received before port"),
            }
        }
    }

    /// Returns `false` once the owner has gone away.
    pub fn send(&self, event: WorkerEvent) -> bool {
        self.outbound.send(event).is_ok()
    }

    /// Block until the owner acknowledges the last delivery. Port updates
    /// seen while waiting are applied. Returns `false` if the owner is gone.
    pub fn wait_for_ack(&mut self) -> bool {
        while let Some(message) = self.inbound.blocking_recv() {
            match message {
                Control::Ack => return true,
                Control::Port(outbound) => self.outbound = outbound,
            }
        }
        false
    }

    /// Apply any queued port updates without blocking. Stray acks are
    /// discarded.
    pub fn absorb_pending(&mut self) {
        while let Ok(message) = self.inbound.try_recv() {
            if let Control::Port(outbound) = message {
                self.outbound = outbound;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handshake_and_ordered_delivery() {
        let (worker_bootstrap, owner_bootstrap) = bootstrap();

        let worker = std::thread::spawn(move || {
            let mut port = WorkerPort::connect(worker_bootstrap).unwrap();
            assert!(port.send(WorkerEvent::Data(b"one".to_vec())));
            assert!(port.wait_for_ack());
            assert!(port.send(WorkerEvent::Data(b"two".to_vec())));
            assert!(port.send(WorkerEvent::ExitCode(0)));
        });

        let mut channel = owner_bootstrap.accept().await.unwrap();
        assert!(matches!(channel.recv().await, Some(WorkerEvent::Data(d)) if d == b"one"));
        assert!(channel.ack());
        assert!(matches!(channel.recv().await, Some(WorkerEvent::Data(d)) if d == b"two"));
        assert!(matches!(channel.recv().await, Some(WorkerEvent::ExitCode(0))));

        worker.join().unwrap();
        assert!(channel.recv().await.is_none());
    }

    #[tokio::test]
    async fn port_update_redirects_events() {
        let (worker_bootstrap, owner_bootstrap) = bootstrap();
        let (redirect_tx, mut redirect_rx) = mpsc::unbounded_channel();

        let worker = std::thread::spawn(move || {
            let mut port = WorkerPort::connect(worker_bootstrap).unwrap();
            assert!(port.send(WorkerEvent::Data(b"first".to_vec())));
            assert!(port.wait_for_ack());
            port.absorb_pending();
            assert!(port.send(WorkerEvent::Data(b"second".to_vec())));
        });

        let mut channel = owner_bootstrap.accept().await.unwrap();
        assert!(matches!(channel.recv().await, Some(WorkerEvent::Data(d)) if d == b"first"));
        channel.control().send(Control::Port(redirect_tx)).unwrap();
        assert!(channel.ack());

        assert!(matches!(redirect_rx.recv().await, Some(WorkerEvent::Data(d)) if d == b"second"));
        worker.join().unwrap();
    }

    #[tokio::test]
    async fn owner_sees_none_when_worker_vanishes_before_handshake() {
        let (worker_bootstrap, owner_bootstrap) = bootstrap();
        drop(worker_bootstrap);
        assert!(owner_bootstrap.accept().await.is_none());
    }

    #[test]
    fn worker_stops_waiting_when_owner_is_gone() {
        let (worker_bootstrap, owner_bootstrap) = bootstrap();
        drop(owner_bootstrap);
        assert!(WorkerPort::connect(worker_bootstrap).is_none());
    }
}
