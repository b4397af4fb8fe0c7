pub mod agent_output;
pub mod config;
pub mod rules;
pub mod scheduler;


use anyhow::Result;
use config::ServerConfig;
use oxcheck_engine::{Engine, NoRules, RulesetSource};
use oxcheck_storage::{FileAutocheckStore, SqliteValueStore};
use rules::RuleFile;
use std::path::Path;
use std::sync::Arc;

/// Wires the built-in plugins, the configured rules and the on-disk stores
/// into an [`Engine`].
pub fn build_engine(config: &ServerConfig) -> Result<Engine> {
    let registry = Arc::new(oxcheck_plugin::builtin_registry()?);
    let rules: Arc<dyn RulesetSource> = match &config.rules_file {
        Some(path) => {
            let rule_file = RuleFile::load(path)?;
            tracing::info!(path = %path, rules = rule_file.rules.len(), "Rules loaded");
            Arc::new(rule_file)
        }
        None => Arc::new(NoRules),
    };

    let data_dir = Path::new(&config.data_dir);
    std::fs::create_dir_all(data_dir)?;
    let autochecks = Arc::new(FileAutocheckStore::new(&config.autochecks_dir())?);
    let value_stores = Arc::new(SqliteValueStore::new(data_dir)?);

    tracing::info!(
        plugins = registry.len(),
        data_dir = %config.data_dir,
        "Engine initialized"
    );
    Ok(Engine::new(registry, rules, autochecks, value_stores).with_precedence(config.rule_precedence))
}
