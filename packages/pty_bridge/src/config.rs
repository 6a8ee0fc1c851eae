use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Bridge config (figment-deserialized from defaults / TOML file / env vars)
// =============================================================================
//
//   bridge.toml:     strategy = "worker"
//                    sync_processed = true
//
//   env var:         PTY_BRIDGE_STRATEGY=polling
//                    PTY_BRIDGE_POLL_INTERVAL_MS=5

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a session moves bytes from the device to its text stream. Chosen
/// once when the session is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeStrategy {
    /// A repeating timer drains the non-blocking read primitive
    Polling { interval: Duration },
    /// A dedicated thread loops on the blocking read primitive. With
    /// `sync_processed` it waits for an ack after every delivery.
    Worker { sync_processed: bool },
}

impl BridgeStrategy {
    pub fn polling() -> Self {
        BridgeStrategy::Polling {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn worker(sync_processed: bool) -> Self {
        BridgeStrategy::Worker { sync_processed }
    }

    pub fn is_ack_gated(&self) -> bool {
        matches!(
            self,
            BridgeStrategy::Worker {
                sync_processed: true
            }
        )
    }
}

impl Default for BridgeStrategy {
    fn default() -> Self {
        BridgeStrategy::worker(false)
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Polling,
    #[default]
    Worker,
}

/// Tunable bridge configuration, deserialized by figment.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Only used by the polling strategy
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Only used by the worker strategy
    #[serde(default)]
    pub sync_processed: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            poll_interval_ms: default_poll_interval_ms(),
            sync_processed: false,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

impl BridgeConfig {
    /// Load from defaults, then `path` (if given), then `PTY_BRIDGE_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        load_figment(path)
            .extract()
            .context("Failed to load bridge configuration")
    }

    pub fn strategy(&self) -> BridgeStrategy {
        match self.strategy {
            StrategyKind::Polling => BridgeStrategy::Polling {
                interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            },
            StrategyKind::Worker => BridgeStrategy::Worker {
                sync_processed: self.sync_processed,
            },
        }
    }
}

/// Build a figment that layers: defaults → TOML file → PTY_BRIDGE_* env vars.
pub fn load_figment(path: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let mut figment = Figment::from(Serialized::defaults(BridgeConfig::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed("PTY_BRIDGE_"))
}
