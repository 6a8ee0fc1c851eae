//! PTY Bridge - a pseudo-terminal as an async text stream
//!
//! A terminal device offers either a non-blocking poll or a blocking read,
//! neither of which fits an async event loop directly. This crate bridges
//! the two with one of two strategies, chosen once per session:
//!
//! - **Polling**: a repeating timer task drains the non-blocking read.
//! - **Worker**: a dedicated thread loops on the blocking read and forwards
//!   bytes over a typed channel, optionally waiting for an ack from the
//!   consumer after every chunk.
//!
//! Either way, bytes are decoded incrementally into UTF-8 text, published in
//! read order to every subscriber, and the exit code is resolved last.
//!
//! # Example
//!
//! ```no_run
//! use pty_bridge::{BridgeStrategy, PseudoTerminal};
//! use pty_core::PtyConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pty = PseudoTerminal::spawn(
//!         PtyConfig::new("/bin/sh").arg("-c").arg("echo hello"),
//!         BridgeStrategy::worker(false),
//!     )
//!     .unwrap();
//!
//!     let mut out = pty.subscribe();
//!     while let Some(text) = out.recv().await {
//!         print!("{}", text);
//!     }
//!     println!("exited with {}", pty.exit_code().wait().await);
//! }
//! ```

pub mod channel;
mod config;
mod decoder;
mod error;
mod exit;
mod output;
mod polling;
mod session;
mod state;
mod terminal;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod worker;

pub use config::{BridgeConfig, BridgeStrategy, DEFAULT_POLL_INTERVAL, StrategyKind, load_figment};
pub use decoder::IncrementalTextDecoder;
pub use error::BridgeError;
pub use exit::{ExitCode, ExitSignal, UNKNOWN_EXIT_CODE};
pub use output::{OutputHub, TextStream};
pub use state::{BridgeState, SessionState};
pub use terminal::PseudoTerminal;
