use crate::selection::Selection;
use serde::Deserialize;

/// Default poll period in seconds.
pub const SCAN_INTERVAL_SECS: u64 = 30;
/// Default bound on a single fetch call, in seconds.
pub const FETCH_TIMEOUT_SECS: u64 = 10;
/// Default number of container detail fetches in flight per endpoint.
pub const MAX_CONCURRENT_INSPECTIONS: usize = 4;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub portainer: PortainerConfig,
    #[serde(default)]
    pub selection: Selection,
    #[serde(default)]
    pub features: Features,
    #[serde(default)]
    pub polling: PollingConfig,
    pub publishing: PublishingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortainerConfig {
    /// `host[:port]` without scheme.
    pub host: String,
    pub api_key: String,
    #[serde(default = "default_true")]
    pub ssl: bool,
    #[serde(default)]
    pub verify_ssl: bool,
    /// Display name of this instance; also the prefix of legacy selection entries.
    pub name: String,
    /// Stable identifier of this instance; the prefix of every composite key.
    pub config_id: String,
}

/// Flags gating which derived fields and surfaces are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Features {
    #[serde(default = "default_true")]
    pub health_check: bool,
    #[serde(default = "default_true")]
    pub restart_policy: bool,
    #[serde(default = "default_true")]
    pub action_buttons: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            health_check: true,
            restart_policy: true,
            action_buttons: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_inspections")]
    pub max_concurrent_inspections: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: SCAN_INTERVAL_SECS,
            fetch_timeout_secs: FETCH_TIMEOUT_SECS,
            max_concurrent_inspections: MAX_CONCURRENT_INSPECTIONS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Max number of repair events kept in the broadcast channel (slow subscribers may lag).
    pub broadcast_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_scan_interval_secs() -> u64 {
    SCAN_INTERVAL_SECS
}

fn default_fetch_timeout_secs() -> u64 {
    FETCH_TIMEOUT_SECS
}

fn default_max_concurrent_inspections() -> usize {
    MAX_CONCURRENT_INSPECTIONS
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.portainer.host.is_empty(),
            "portainer.host must be non-empty"
        );
        anyhow::ensure!(
            !self.portainer.api_key.is_empty(),
            "portainer.api_key must be non-empty"
        );
        anyhow::ensure!(
            !self.portainer.config_id.is_empty(),
            "portainer.config_id must be non-empty"
        );
        anyhow::ensure!(
            self.polling.scan_interval_secs > 0,
            "polling.scan_interval_secs must be > 0, got {}",
            self.polling.scan_interval_secs
        );
        anyhow::ensure!(
            self.polling.fetch_timeout_secs > 0,
            "polling.fetch_timeout_secs must be > 0, got {}",
            self.polling.fetch_timeout_secs
        );
        anyhow::ensure!(
            self.polling.max_concurrent_inspections > 0,
            "polling.max_concurrent_inspections must be > 0, got {}",
            self.polling.max_concurrent_inspections
        );
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        Ok(())
    }
}
