#![allow(dead_code)]

use anyhow::Result;
use oxcheck_engine::Engine;
use oxcheck_server::build_engine;
use oxcheck_server::config::ServerConfig;
use oxcheck_server::scheduler::CheckScheduler;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const RULES: &str = r#"
[[rule]]
ruleset = "winperf_ts_sessions"
value = { active = [100, 200], inactive = [50, 100] }

[[rule]]
ruleset = "winperf_ts_sessions"
hosts = ["term-*"]
value = { active = [10, 20] }
"#;

pub fn sessions_output(total: u32, active: u32, inactive: u32) -> String {
    format!(
        "<<<winperf_ts_sessions>>>\n1385714515.93 2102\n2 {total} rawcount\n4 {active} rawcount\n6 {inactive} rawcount\n"
    )
}

pub const TSM_OUTPUT: &str = "\
<<<tsm_drives>>>
tsmfarm3   LIBRARY3   DRIVE01   LOADED   YES   000782XXXX
default    GPFSFILE   GPFSFILE1 UNKNOWN  YES   000783XXXX
";

pub struct TestContext {
    pub temp_dir: TempDir,
    pub config: ServerConfig,
    pub engine: Arc<Engine>,
    pub scheduler: CheckScheduler,
}

impl TestContext {
    pub fn spool_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.spool_dir)
    }

    pub fn write_spool(&self, host: &str, text: &str) -> Result<()> {
        std::fs::write(self.spool_dir().join(format!("{host}.txt")), text)?;
        Ok(())
    }

    pub fn remove_spool(&self, host: &str) -> Result<()> {
        std::fs::remove_file(self.spool_dir().join(format!("{host}.txt")))?;
        Ok(())
    }

    pub fn autochecks_file(&self, host: &str) -> PathBuf {
        self.config.autochecks_dir().join(format!("{host}.json"))
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub fn build_test_context() -> Result<TestContext> {
    let temp_dir = TempDir::new()?;
    let spool_dir = temp_dir.path().join("spool");
    std::fs::create_dir_all(&spool_dir)?;
    let rules_file = temp_dir.path().join("rules.toml");
    std::fs::write(&rules_file, RULES)?;

    let config = ServerConfig {
        data_dir: path_string(&temp_dir.path().join("data")),
        spool_dir: path_string(&spool_dir),
        rules_file: Some(path_string(&rules_file)),
        max_concurrent: 2,
        cycle_timeout_secs: 10,
        ..ServerConfig::default()
    };
    config.validate()?;

    let engine = Arc::new(build_engine(&config)?);
    let scheduler = CheckScheduler::new(engine.clone(), &config);
    Ok(TestContext {
        temp_dir,
        config,
        engine,
        scheduler,
    })
}
