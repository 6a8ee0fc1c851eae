#[cfg(not(unix))]
use portable_pty::ChildKiller;
use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, native_pty_system};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, error, info, warn};

use crate::device::PtyCore;
use crate::error::PtyError;
use crate::signal::Signal;

const READ_BUFFER_SIZE: usize = 4096;

/// Configuration for spawning a PTY
#[derive(Clone, Debug)]
pub struct PtyConfig {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    pub env: Vec<(String, String)>,
    pub rows: u16,
    pub cols: u16,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            command: "/bin/bash".to_string(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
            rows: 24,
            cols: 80,
        }
    }
}

impl PtyConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn command_builder(&self) -> CommandBuilder {
        let mut cmd = CommandBuilder::new(&self.command);
        for arg in &self.args {
            cmd.arg(arg);
        }

        if let Some(dir) = &self.working_dir {
            debug!("Setting working directory: {}", dir);
            cmd.cwd(dir);
        }

        cmd.env("TERM", "xterm-256color");
        cmd.env("COLORTERM", "truecolor");

        for key in ["PATH", "HOME", "USER"] {
            if let Ok(value) = std::env::var(key) {
                cmd.env(key, value);
            }
        }

        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

/// A child process attached to a native pseudo-terminal.
///
/// A reader thread moves bytes off the master side into an in-process
/// queue, which is what both read primitives consume. The exit code is
/// only reported once that thread has seen end-of-file, so output written
/// just before the child exits is never stranded behind the exit event.
///
/// Once either exit primitive has reaped the child, its PID may belong to
/// another process, so every later [`PtyCore::kill`] is refused.
pub struct NativePty {
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Mutex<Box<dyn Write + Send>>,
    child: Mutex<Box<dyn Child + Send + Sync>>,
    #[cfg(not(unix))]
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    output: Mutex<Receiver<Vec<u8>>>,
    reader_done: Arc<AtomicBool>,
    exit_code: OnceLock<i32>,
    pid: Option<u32>,
}

impl NativePty {
    /// Open a PTY and spawn `config.command` on its slave side
    pub fn spawn(config: PtyConfig) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();

        let pair = pty_system.openpty(PtySize {
            rows: config.rows,
            cols: config.cols,
            pixel_width: 0,
            pixel_height: 0,
        })?;

        info!(
            "Spawning PTY command: {} with args: {:?}",
            config.command, config.args
        );

        let child = pair
            .slave
            .spawn_command(config.command_builder())
            .map_err(|e| {
                error!("Failed to spawn command '{}': {}", config.command, e);
                PtyError::CreateFailed(e.to_string())
            })?;
        // The master only sees EOF once every slave handle is closed.
        drop(pair.slave);

        let pid = child.process_id();
        info!("PTY process started with PID: {:?}", pid);

        // Take the writer up-front to keep the child's stdin open
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::WriteFailed(e.to_string()))?;
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::ReadFailed(e.to_string()))?;

        let (output_tx, output_rx) = mpsc::channel();
        let reader_done = Arc::new(AtomicBool::new(false));
        let done = reader_done.clone();

        std::thread::spawn(move || {
            let mut buffer = vec![0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => {
                        info!("PTY EOF detected - process has exited");
                        break;
                    }
                    Ok(n) => {
                        if output_tx.send(buffer[..n].to_vec()).is_err() {
                            debug!("PTY output queue dropped");
                            break;
                        }
                    }
                    Err(e) => {
                        // Linux reports EIO once the slave side is gone
                        debug!("PTY read ended: {}", e);
                        break;
                    }
                }
            }
            done.store(true, Ordering::Release);
            info!("PTY reader thread exiting");
        });

        #[cfg(not(unix))]
        let killer = child.clone_killer();

        Ok(Self {
            master: Mutex::new(pair.master),
            writer: Mutex::new(writer),
            child: Mutex::new(child),
            #[cfg(not(unix))]
            killer: Mutex::new(killer),
            output: Mutex::new(output_rx),
            reader_done,
            exit_code: OnceLock::new(),
            pid,
        })
    }

    fn reaped(&self, code: i32) -> i32 {
        *self.exit_code.get_or_init(|| code)
    }

    /// Signals go to the child's process group. The child leads its own
    /// session, so this also reaches whatever it is running in the
    /// foreground, which would otherwise keep the slave side open.
    #[cfg(unix)]
    fn send_signal(&self, signal: Signal) -> Result<(), PtyError> {
        use nix::sys::signal::{self as nix_signal, killpg};
        use nix::unistd::Pid;

        let pid = self.pid.ok_or(PtyError::ProcessExited)?;
        let sig = match signal {
            Signal::Term => nix_signal::Signal::SIGTERM,
            Signal::Kill => nix_signal::Signal::SIGKILL,
            Signal::Hangup => nix_signal::Signal::SIGHUP,
            Signal::Interrupt => nix_signal::Signal::SIGINT,
        };
        killpg(Pid::from_raw(pid as i32), sig).map_err(|e| PtyError::KillFailed(e.to_string()))
    }

    #[cfg(not(unix))]
    fn send_signal(&self, _signal: Signal) -> Result<(), PtyError> {
        lock(&self.killer)
            .kill()
            .map_err(|e| PtyError::KillFailed(e.to_string()))
    }
}

impl PtyCore for NativePty {
    fn read_non_blocking(&self) -> Result<Option<Vec<u8>>, PtyError> {
        match lock(&self.output).try_recv() {
            Ok(data) => Ok(Some(data)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
        }
    }

    fn read_blocking(&self) -> Result<Option<Vec<u8>>, PtyError> {
        // A disconnected queue means the reader thread hit EOF
        Ok(lock(&self.output).recv().ok())
    }

    fn exit_code_non_blocking(&self) -> Result<Option<i32>, PtyError> {
        if let Some(code) = self.exit_code.get() {
            return Ok(Some(*code));
        }
        if !self.reader_done.load(Ordering::Acquire) {
            return Ok(None);
        }
        let status = lock(&self.child)
            .try_wait()
            .map_err(|e| PtyError::WaitFailed(e.to_string()))?;
        Ok(status.map(|s| self.reaped(s.exit_code() as i32)))
    }

    fn exit_code_blocking(&self) -> Result<i32, PtyError> {
        if let Some(code) = self.exit_code.get() {
            return Ok(*code);
        }
        let status = lock(&self.child)
            .wait()
            .map_err(|e| PtyError::WaitFailed(e.to_string()))?;
        info!("PTY process exited with status: {:?}", status);
        Ok(self.reaped(status.exit_code() as i32))
    }

    fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        let mut writer = lock(&self.writer);
        writer
            .write_all(data)
            .map_err(|e| PtyError::WriteFailed(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| PtyError::WriteFailed(e.to_string()))
    }

    fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        lock(&self.master)
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::ResizeFailed(e.to_string()))
    }

    fn kill(&self, signal: Signal) -> bool {
        let result = if self.exit_code.get().is_some() {
            Err(PtyError::ProcessExited)
        } else {
            match signal {
                Signal::Interrupt => self.write(b"\x03"),
                Signal::Term | Signal::Kill | Signal::Hangup => self.send_signal(signal),
            }
        };
        match result {
            Ok(()) => {
                info!("Delivered {} to PTY process {:?}", signal, self.pid);
                true
            }
            Err(e) => {
                warn!("Failed to deliver {} to PTY process: {}", signal, e);
                false
            }
        }
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

// A panic while holding one of these locks leaves nothing half-updated
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
