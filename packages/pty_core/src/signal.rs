use std::fmt;
use std::str::FromStr;

use crate::error::PtyError;

/// Signals a caller can ask the device to deliver to its child
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Signal {
    #[default]
    Term,
    Kill,
    /// Delivered as Ctrl+C through the terminal rather than `kill(2)`
    Interrupt,
    Hangup,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Term => "SIGTERM",
            Signal::Kill => "SIGKILL",
            Signal::Interrupt => "SIGINT",
            Signal::Hangup => "SIGHUP",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = PtyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "TERM" => Ok(Signal::Term),
            "KILL" => Ok(Signal::Kill),
            "INT" => Ok(Signal::Interrupt),
            "HUP" => Ok(Signal::Hangup),
            _ => Err(PtyError::UnsupportedSignal(s.to_string())),
        }
    }
}
