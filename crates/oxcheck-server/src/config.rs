use oxcheck_engine::{DiscoveryMode, RulePrecedence};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Autochecks and the value-store database live here.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Agent output of each host, one `<host>.txt` file per host.
    #[serde(default = "default_spool_dir")]
    pub spool_dir: String,
    /// Optional TOML rule file supplying check parameters.
    #[serde(default)]
    pub rules_file: Option<String>,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Periodic discovery; `0` disables it.
    #[serde(default = "default_discovery_interval_secs")]
    pub discovery_interval_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Time budget of one host cycle.
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,
    #[serde(default)]
    pub discovery_mode: DiscoveryMode,
    #[serde(default)]
    pub rule_precedence: RulePrecedence,
    /// Snowflake node id for crash ids (`0..32`).
    #[serde(default = "default_node_id")]
    pub node_id: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            spool_dir: default_spool_dir(),
            rules_file: None,
            check_interval_secs: default_check_interval_secs(),
            discovery_interval_secs: default_discovery_interval_secs(),
            max_concurrent: default_max_concurrent(),
            cycle_timeout_secs: default_cycle_timeout_secs(),
            discovery_mode: DiscoveryMode::default(),
            rule_precedence: RulePrecedence::default(),
            node_id: default_node_id(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config '{path}': {e}"))?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.check_interval_secs == 0 {
            anyhow::bail!("check_interval_secs must be greater than 0");
        }
        if self.max_concurrent == 0 {
            anyhow::bail!("max_concurrent must be greater than 0");
        }
        if self.cycle_timeout_secs == 0 {
            anyhow::bail!("cycle_timeout_secs must be greater than 0");
        }
        if !(0..32).contains(&self.node_id) {
            anyhow::bail!("node_id must be in 0..32, got {}", self.node_id);
        }
        Ok(())
    }

    pub fn autochecks_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("autochecks")
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_spool_dir() -> String {
    "spool".to_string()
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_discovery_interval_secs() -> u64 {
    7200
}

fn default_max_concurrent() -> usize {
    8
}

fn default_cycle_timeout_secs() -> u64 {
    50
}

fn default_node_id() -> i32 {
    1
}
