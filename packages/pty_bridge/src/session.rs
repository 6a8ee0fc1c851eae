use tracing::{debug, info, warn};

use crate::decoder::IncrementalTextDecoder;
use crate::exit::ExitSignal;
use crate::output::OutputHub;
use crate::state::{BridgeState, SessionState};

/// Everything downstream of the device read: decoding, publication and the
/// terminal sequence. Owned by exactly one task, so the decoder's pending
/// bytes are never touched concurrently.
pub(crate) struct ReadPath {
    decoder: IncrementalTextDecoder,
    hub: OutputHub,
    exit: ExitSignal,
    state: SessionState,
}

impl ReadPath {
    pub(crate) fn new(hub: OutputHub, exit: ExitSignal, state: SessionState) -> Self {
        Self {
            decoder: IncrementalTextDecoder::new(),
            hub,
            exit,
            state,
        }
    }

    pub(crate) fn start(&self) {
        if let Err(e) = self.state.advance(BridgeState::Running) {
            warn!("read path started twice: {}", e);
        }
    }

    /// Decode one raw chunk and publish the result. Returns `true` if a
    /// text chunk was handed to the stream.
    pub(crate) fn ingest(&mut self, chunk: &[u8]) -> bool {
        match self.decoder.feed(chunk) {
            Some(text) => {
                self.hub.publish(text);
                true
            }
            None => {
                debug!(
                    "{} byte read produced no text ({} pending)",
                    chunk.len(),
                    self.decoder.pending_len()
                );
                false
            }
        }
    }

    /// Run the terminal sequence: drain, flush, close the stream, and only
    /// then resolve the exit code so it is always the last thing observed.
    pub(crate) fn finish(mut self, code: i32) {
        if let Err(e) = self.state.advance(BridgeState::Draining) {
            warn!("unexpected state at exit: {}", e);
        }
        if let Some(text) = self.decoder.flush() {
            self.hub.publish(text);
        }
        self.hub.close();
        if let Err(e) = self.state.close() {
            warn!("unexpected state at close: {}", e);
        }
        if self.decoder.dropped_bytes() > 0 {
            info!(
                dropped = self.decoder.dropped_bytes(),
                "session discarded undecodable output"
            );
        }
        // A second resolution is rejected and already logged
        let _ = self.exit.resolve(code);
        info!("PTY session closed with exit code {}", code);
    }
}
