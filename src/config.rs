use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub miner: MinerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MinerConfig {
    /// SCN to begin mining at: "min", "current", a literal SCN, or absent to
    /// resume from persisted offsets.
    #[serde(default)]
    pub seek_scn: Option<String>,
    #[serde(default = "default_fetch_size")]
    pub fetch_size: u32,
    /// Patterns of fully-qualified table names to mine. Exclusive with `exclude`.
    #[serde(default)]
    pub include: Vec<String>,
    /// Patterns of fully-qualified table names to skip. Exclusive with `include`.
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    #[serde(default = "default_table_poll_interval_ms")]
    pub table_poll_interval_ms: u64,
    #[serde(default = "default_table_wait_timeout_secs")]
    pub table_wait_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            table_poll_interval_ms: default_table_poll_interval_ms(),
            table_wait_timeout_secs: default_table_wait_timeout_secs(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("LOGMINER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_fetch_size() -> u32 {
    100
}

fn default_max_tasks() -> usize {
    1
}

fn default_table_poll_interval_ms() -> u64 {
    60_000
}

fn default_table_wait_timeout_secs() -> u64 {
    10
}
