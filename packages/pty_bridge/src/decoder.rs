use tracing::{debug, warn};

/// Turns raw terminal output chunks into valid UTF-8 text.
///
/// A read from the device can end in the middle of a multi-byte character.
/// Those trailing bytes are held back until the next chunk completes them.
/// Bytes that can never form valid UTF-8 are dropped and decoding resumes
/// right after them, so corrupt input costs a few bytes instead of stalling
/// the stream.
#[derive(Debug, Default)]
pub struct IncrementalTextDecoder {
    pending: Vec<u8>,
    dropped: usize,
}

impl IncrementalTextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk` together with anything held back from earlier chunks.
    /// Returns `None` when no complete text is available yet.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(chunk);
        self.drain(false)
    }

    /// Decode whatever is left at end of stream. An incomplete trailing
    /// sequence is discarded.
    pub fn flush(&mut self) -> Option<String> {
        self.drain(true)
    }

    /// Bytes currently held back waiting for the rest of a character
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Total bytes discarded as undecodable over the decoder's lifetime
    pub fn dropped_bytes(&self) -> usize {
        self.dropped
    }

    fn drain(&mut self, at_end: bool) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }

        let mut text = String::with_capacity(self.pending.len());
        let mut tail = Vec::new();
        let mut dropped = 0;

        let mut chunks = self.pending.utf8_chunks().peekable();
        while let Some(chunk) = chunks.next() {
            text.push_str(chunk.valid());

            let invalid = chunk.invalid();
            if invalid.is_empty() {
                continue;
            }
            // Only the very end of the buffer can be a character that is
            // still arriving; anything before it is corrupt.
            let incomplete = chunks.peek().is_none()
                && std::str::from_utf8(invalid).is_err_and(|e| e.error_len().is_none());
            if incomplete && !at_end {
                tail.extend_from_slice(invalid);
            } else {
                dropped += invalid.len();
            }
        }

        if dropped > 0 {
            if at_end {
                debug!(dropped, "discarding undecodable bytes at end of stream");
            } else {
                warn!(dropped, "discarding invalid UTF-8 in terminal output");
            }
            self.dropped += dropped;
        }
        self.pending = tail;

        (!text.is_empty()).then_some(text)
    }
}
