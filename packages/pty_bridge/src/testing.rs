//! Scripted device for exercising bridges without a real pty.

use pty_core::{PtyCore, PtyError, Signal};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A [`PtyCore`] whose reads and exit code follow a script and which counts
/// every call made to it.
///
/// Non-blocking reads pop from their own queue (an entry of `None` is a
/// "nothing right now" answer; an empty queue also answers `None`). The
/// non-blocking exit check answers `None` for the first `exit_after_checks`
/// calls. Blocking reads pop from a separate queue and answer `None` once it
/// is empty, after which `exit_code_blocking` reports the scripted code.
pub struct FakePty {
    non_blocking: Mutex<VecDeque<Option<Vec<u8>>>>,
    blocking: Mutex<VecDeque<Vec<u8>>>,
    exit_code: i32,
    exit_after_checks: usize,
    accept_kill: bool,
    read_delay: Option<Duration>,

    non_blocking_reads: AtomicUsize,
    blocking_reads: AtomicUsize,
    exit_checks: AtomicUsize,
    writes: Mutex<Vec<Vec<u8>>>,
    resizes: Mutex<Vec<(u16, u16)>>,
    kills: Mutex<Vec<Signal>>,
}

impl Default for FakePty {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePty {
    pub fn new() -> Self {
        Self {
            non_blocking: Mutex::new(VecDeque::new()),
            blocking: Mutex::new(VecDeque::new()),
            exit_code: 0,
            exit_after_checks: 0,
            accept_kill: true,
            read_delay: None,
            non_blocking_reads: AtomicUsize::new(0),
            blocking_reads: AtomicUsize::new(0),
            exit_checks: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
            resizes: Mutex::new(Vec::new()),
            kills: Mutex::new(Vec::new()),
        }
    }

    pub fn with_non_blocking_reads<I>(self, reads: I) -> Self
    where
        I: IntoIterator<Item = Option<Vec<u8>>>,
    {
        lock(&self.non_blocking).extend(reads);
        self
    }

    pub fn with_blocking_reads<I>(self, reads: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        lock(&self.blocking).extend(reads);
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn exit_after_checks(mut self, checks: usize) -> Self {
        self.exit_after_checks = checks;
        self
    }

    /// Make every blocking read take at least `delay`
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn rejecting_kills(mut self) -> Self {
        self.accept_kill = false;
        self
    }

    /// Queue more output for the non-blocking reader
    pub fn push_non_blocking(&self, data: Vec<u8>) {
        lock(&self.non_blocking).push_back(Some(data));
    }

    pub fn non_blocking_reads(&self) -> usize {
        self.non_blocking_reads.load(Ordering::SeqCst)
    }

    pub fn blocking_reads(&self) -> usize {
        self.blocking_reads.load(Ordering::SeqCst)
    }

    pub fn exit_checks(&self) -> usize {
        self.exit_checks.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.writes).clone()
    }

    pub fn resizes(&self) -> Vec<(u16, u16)> {
        lock(&self.resizes).clone()
    }

    pub fn kills(&self) -> Vec<Signal> {
        lock(&self.kills).clone()
    }
}

impl PtyCore for FakePty {
    fn read_non_blocking(&self) -> Result<Option<Vec<u8>>, PtyError> {
        self.non_blocking_reads.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.non_blocking).pop_front().flatten())
    }

    fn read_blocking(&self) -> Result<Option<Vec<u8>>, PtyError> {
        self.blocking_reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        Ok(lock(&self.blocking).pop_front())
    }

    fn exit_code_non_blocking(&self) -> Result<Option<i32>, PtyError> {
        let checks = self.exit_checks.fetch_add(1, Ordering::SeqCst);
        Ok((checks >= self.exit_after_checks).then_some(self.exit_code))
    }

    fn exit_code_blocking(&self) -> Result<i32, PtyError> {
        Ok(self.exit_code)
    }

    fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        lock(&self.writes).push(data.to_vec());
        Ok(())
    }

    fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        lock(&self.resizes).push((cols, rows));
        Ok(())
    }

    fn kill(&self, signal: Signal) -> bool {
        lock(&self.kills).push(signal);
        self.accept_kill
    }

    fn pid(&self) -> Option<u32> {
        Some(4242)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pty_bridge=debug")),
        )
        .with_test_writer()
        .try_init();
}
