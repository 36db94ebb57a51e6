//! Runtime configuration for order book engines.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Tunable engine settings, loadable from an `orderbook` config file and
/// `ORDERBOOK_*` environment variables. All fields have conservative
/// defaults so a bare [`OrderBookConfig::default`] is a valid production
/// setup.
#[derive(Debug, Deserialize, Clone)]
pub struct OrderBookConfig {
    /// Batching interval for buffered sources, in milliseconds.
    /// Zero disables buffering and forwards batches synchronously.
    #[serde(default = "default_buffer_interval_ms")]
    pub buffer_interval_ms: u64,

    /// Enable the periodic snapshot reload supervisor
    #[serde(default = "default_snapshot_reload_enabled")]
    pub snapshot_reload_enabled: bool,

    /// Reload supervisor interval in seconds
    #[serde(default = "default_snapshot_reload_secs")]
    pub snapshot_reload_secs: u64,

    /// Populate touched levels in change notifications
    #[serde(default = "default_debug")]
    pub debug: bool,
}

impl Default for OrderBookConfig {
    fn default() -> Self {
        Self {
            buffer_interval_ms: default_buffer_interval_ms(),
            snapshot_reload_enabled: default_snapshot_reload_enabled(),
            snapshot_reload_secs: default_snapshot_reload_secs(),
            debug: default_debug(),
        }
    }
}

fn default_buffer_interval_ms() -> u64 {
    0
}
fn default_snapshot_reload_enabled() -> bool {
    false
}
fn default_snapshot_reload_secs() -> u64 {
    60
}
fn default_debug() -> bool {
    false
}

impl OrderBookConfig {
    /// Load from an optional `orderbook.{toml,yaml,json}` file in the
    /// working directory, overridden by `ORDERBOOK_*` environment variables
    /// (e.g. `ORDERBOOK_SNAPSHOT_RELOAD_SECS=30`).
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("orderbook").required(false))
            .add_source(Environment::with_prefix("ORDERBOOK").try_parsing(true))
            .build()?;
        settings.try_deserialize()
    }

    /// Buffering interval as a [`Duration`].
    pub fn buffer_interval(&self) -> Duration {
        Duration::from_millis(self.buffer_interval_ms)
    }

    /// Reload supervisor interval as a [`Duration`].
    pub fn snapshot_reload_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_reload_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let config = OrderBookConfig::default();
        assert_eq!(config.buffer_interval_ms, 0);
        assert!(!config.snapshot_reload_enabled);
        assert_eq!(config.snapshot_reload_secs, 60);
        assert!(!config.debug);
    }

    #[test]
    fn environment_overlay_overrides_defaults() {
        std::env::set_var("ORDERBOOK_SNAPSHOT_RELOAD_SECS", "30");
        std::env::set_var("ORDERBOOK_DEBUG", "true");

        let config = OrderBookConfig::load().expect("load with env overlay");
        assert_eq!(config.snapshot_reload_secs, 30);
        assert!(config.debug);
        assert_eq!(config.buffer_interval_ms, 0);

        std::env::remove_var("ORDERBOOK_SNAPSHOT_RELOAD_SECS");
        std::env::remove_var("ORDERBOOK_DEBUG");
    }

    #[test]
    fn duration_helpers() {
        let config = OrderBookConfig {
            buffer_interval_ms: 100,
            snapshot_reload_secs: 30,
            ..OrderBookConfig::default()
        };
        assert_eq!(config.buffer_interval(), Duration::from_millis(100));
        assert_eq!(config.snapshot_reload_interval(), Duration::from_secs(30));
    }
}
