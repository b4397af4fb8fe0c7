use crate::agent_output::{list_hosts, read_spool};
use crate::config::ServerConfig;
use anyhow::Result;
use chrono::Utc;
use oxcheck_engine::{DiscoveryMode, Engine, EngineError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    Check,
    Discovery(DiscoveryMode),
}

impl std::fmt::Display for CycleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleKind::Check => f.write_str("check"),
            CycleKind::Discovery(mode) => write!(f, "discovery ({mode})"),
        }
    }
}

/// Outcome counts of one scheduler pass over all hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub hosts: usize,
    pub completed: usize,
    /// Hosts whose previous cycle was still running.
    pub skipped: usize,
    pub failed: usize,
    pub timed_out: usize,
}

enum HostOutcome {
    Completed,
    Skipped,
    Failed,
    TimedOut,
}

/// Periodically runs check and discovery cycles for every host with agent
/// output in the spool directory.
pub struct CheckScheduler {
    engine: Arc<Engine>,
    spool_dir: PathBuf,
    check_interval_secs: u64,
    discovery_interval_secs: u64,
    cycle_timeout_secs: u64,
    max_concurrent: usize,
    discovery_mode: DiscoveryMode,
}

impl CheckScheduler {
    pub fn new(engine: Arc<Engine>, config: &ServerConfig) -> Self {
        Self {
            engine,
            spool_dir: PathBuf::from(&config.spool_dir),
            check_interval_secs: config.check_interval_secs,
            discovery_interval_secs: config.discovery_interval_secs,
            cycle_timeout_secs: config.cycle_timeout_secs,
            max_concurrent: config.max_concurrent,
            discovery_mode: config.discovery_mode,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            check_interval = self.check_interval_secs,
            discovery_interval = self.discovery_interval_secs,
            max_concurrent = self.max_concurrent,
            "Check scheduler started"
        );

        let mut check_tick = interval(Duration::from_secs(self.check_interval_secs));
        check_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // A zero interval disables discovery; the branch below never fires.
        let discovery_enabled = self.discovery_interval_secs > 0;
        let mut discovery_tick = interval(Duration::from_secs(self.discovery_interval_secs.max(1)));
        discovery_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let kind = tokio::select! {
                _ = discovery_tick.tick(), if discovery_enabled => CycleKind::Discovery(self.discovery_mode),
                _ = check_tick.tick() => CycleKind::Check,
            };
            if let Err(e) = self.run_cycle(kind).await {
                tracing::error!(cycle = %kind, error = %e, "Cycle failed");
            }
        }
    }

    /// Runs one cycle of `kind` for all hosts, at most `max_concurrent` at a
    /// time.
    pub async fn run_cycle(&self, kind: CycleKind) -> Result<CycleSummary> {
        let hosts = list_hosts(&self.spool_dir)?;
        let mut summary = CycleSummary {
            hosts: hosts.len(),
            ..CycleSummary::default()
        };
        if hosts.is_empty() {
            return Ok(summary);
        }

        tracing::debug!(cycle = %kind, count = hosts.len(), "Starting cycle");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(hosts.len());

        for host in hosts {
            let permit = semaphore.clone().acquire_owned().await?;
            let engine = self.engine.clone();
            let spool_dir = self.spool_dir.clone();
            let timeout = Duration::from_secs(self.cycle_timeout_secs);

            let handle = tokio::spawn(async move {
                let task_host = host.clone();
                let job = tokio::task::spawn_blocking(move || {
                    run_host(&engine, &spool_dir, &task_host, kind)
                });
                let outcome = match tokio::time::timeout(timeout, job).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => {
                        tracing::error!(host = %host, error = %e, "Host task aborted");
                        HostOutcome::Failed
                    }
                    Err(_) => {
                        tracing::warn!(host = %host, timeout_secs = timeout.as_secs(), "Host cycle timed out");
                        HostOutcome::TimedOut
                    }
                };
                drop(permit);
                outcome
            });
            handles.push(handle);
        }

        for handle in handles {
            match handle.await {
                Ok(HostOutcome::Completed) => summary.completed += 1,
                Ok(HostOutcome::Skipped) => summary.skipped += 1,
                Ok(HostOutcome::Failed) => summary.failed += 1,
                Ok(HostOutcome::TimedOut) => summary.timed_out += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Scheduler task panicked");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            cycle = %kind,
            hosts = summary.hosts,
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed,
            timed_out = summary.timed_out,
            "Cycle finished"
        );
        Ok(summary)
    }
}

fn run_host(engine: &Engine, spool_dir: &Path, host: &str, kind: CycleKind) -> HostOutcome {
    let raw = match read_spool(spool_dir, host) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(host, error = %e, "Skipping host without readable agent output");
            return HostOutcome::Failed;
        }
    };
    let result = match kind {
        CycleKind::Check => engine.check_host(host, &raw, Utc::now()).map(|_| ()),
        CycleKind::Discovery(mode) => engine.discover_host(host, &raw, mode).map(|_| ()),
    };
    match result {
        Ok(()) => HostOutcome::Completed,
        Err(EngineError::HostBusy(_)) => {
            tracing::warn!(host, cycle = %kind, "Previous cycle still running, skipped");
            HostOutcome::Skipped
        }
        Err(e) => {
            tracing::error!(host, cycle = %kind, error = %e, "Host cycle failed");
            HostOutcome::Failed
        }
    }
}
