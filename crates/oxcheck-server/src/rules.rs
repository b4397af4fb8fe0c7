//! Parameter rules loaded from a TOML file.
//!
//! ```toml
//! [[rule]]
//! ruleset = "winperf_ts_sessions"
//! hosts = ["term-*"]
//! value = { active = [10, 20] }
//! ```
//!
//! Rules apply in file order, so later rules are treated as more specific.

use anyhow::Result;
use oxcheck_engine::RulesetSource;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub ruleset: String,
    /// Glob patterns on the host name.
    #[serde(default = "match_all")]
    pub hosts: Vec<String>,
    /// Glob patterns on the item; unset matches every service.
    #[serde(default)]
    pub items: Option<Vec<String>>,
    /// Glob patterns on the service description; unset matches every service.
    #[serde(default)]
    pub services: Option<Vec<String>>,
    pub value: Value,
}

fn match_all() -> Vec<String> {
    vec!["*".to_string()]
}

fn any_matches(patterns: &[String], value: &str) -> bool {
    patterns
        .iter()
        .any(|p| p == "*" || glob_match::glob_match(p, value))
}

impl Rule {
    pub fn matches(
        &self,
        ruleset: &str,
        host: &str,
        item: Option<&str>,
        service_description: &str,
    ) -> bool {
        if self.ruleset != ruleset || !any_matches(&self.hosts, host) {
            return false;
        }
        if let Some(items) = &self.items {
            match item {
                Some(item) if any_matches(items, item) => {}
                _ => return false,
            }
        }
        if let Some(services) = &self.services {
            if !any_matches(services, service_description) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleFile {
    #[serde(default, rename = "rule")]
    pub rules: Vec<Rule>,
}

impl RuleFile {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read rule file '{path}': {e}"))?;
        Self::parse(&content).map_err(|e| anyhow::anyhow!("Invalid rule file '{path}': {e}"))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl RulesetSource for RuleFile {
    fn values(
        &self,
        ruleset: &str,
        host: &str,
        item: Option<&str>,
        service_description: &str,
    ) -> Vec<Value> {
        self.rules
            .iter()
            .filter(|r| r.matches(ruleset, host, item, service_description))
            .map(|r| r.value.clone())
            .collect()
    }
}
