use futures::Stream;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

struct HubInner {
    subscribers: Vec<UnboundedSender<String>>,
    closed: bool,
}

/// Fans decoded text out to every subscribed [`TextStream`].
///
/// Each subscriber receives chunks in publish order, starting with the
/// first chunk published after it subscribed. Once closed, the hub refuses
/// further chunks.
#[derive(Clone)]
pub struct OutputHub {
    inner: Arc<Mutex<HubInner>>,
}

impl Default for OutputHub {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                subscribers: Vec::new(),
                closed: false,
            })),
        }
    }

    pub fn subscribe(&self) -> TextStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        if !inner.closed {
            inner.subscribers.push(tx);
        }
        // When closed, `tx` drops here and the stream is already finished
        TextStream { rx }
    }

    /// Returns `false` if the hub is closed and the chunk was discarded.
    pub fn publish(&self, chunk: String) -> bool {
        let mut inner = self.lock();
        if inner.closed {
            debug!("dropping {} bytes of text published after close", chunk.len());
            return false;
        }
        // Subscribers that hung up are pruned as we go
        inner.subscribers.retain(|tx| tx.send(chunk.clone()).is_ok());
        true
    }

    /// Ends every subscribed stream once it has drained.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A subscriber's view of a terminal's decoded output
#[derive(Debug)]
pub struct TextStream {
    rx: UnboundedReceiver<String>,
}

impl TextStream {
    /// Next chunk, or `None` once the session has closed its output and
    /// everything before that has been received.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

impl Stream for TextStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
