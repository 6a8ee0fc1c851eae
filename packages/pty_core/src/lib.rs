//! PTY Core - the pseudo-terminal device contract
//!
//! This crate defines [`PtyCore`], the handful of primitives a bridge needs
//! from a terminal device (non-blocking and blocking reads, exit checks,
//! write, resize, kill), and [`NativePty`], an implementation backed by
//! `portable-pty`. It knows nothing about text decoding or async streams.
//!
//! # Example
//!
//! ```no_run
//! use pty_core::{NativePty, PtyConfig, PtyCore};
//!
//! let pty = NativePty::spawn(PtyConfig::new("/bin/sh").arg("-c").arg("echo hi")).unwrap();
//! while let Ok(Some(bytes)) = pty.read_blocking() {
//!     print!("{}", String::from_utf8_lossy(&bytes));
//! }
//! println!("exit code: {}", pty.exit_code_blocking().unwrap());
//! ```

mod device;
mod error;
mod native;
mod signal;

pub use device::PtyCore;
pub use error::PtyError;
pub use native::{NativePty, PtyConfig};
pub use signal::Signal;
