mod common;

use anyhow::Result;
use chrono::Utc;
use common::{build_test_context, sessions_output, TSM_OUTPUT};
use oxcheck_common::types::{ServiceId, State};
use oxcheck_engine::{DiscoveryMode, Transition};
use oxcheck_server::agent_output::read_spool;
use oxcheck_server::scheduler::{CycleKind, CycleSummary};

fn sessions_id() -> ServiceId {
    ServiceId::new("winperf_ts_sessions", None)
}

fn drive_id(item: &str) -> ServiceId {
    ServiceId::new("tsm_drives", Some(item))
}

#[tokio::test]
async fn discovery_and_check_cycles_over_spooled_hosts() -> Result<()> {
    let ctx = build_test_context()?;
    ctx.write_spool("term-01", &format!("{}{TSM_OUTPUT}", sessions_output(20, 18, 2)))?;
    ctx.write_spool("db-01", &sessions_output(100, 90, 10))?;

    let summary = ctx
        .scheduler
        .run_cycle(CycleKind::Discovery(DiscoveryMode::New))
        .await?;
    assert_eq!(
        summary,
        CycleSummary {
            hosts: 2,
            completed: 2,
            ..CycleSummary::default()
        }
    );
    assert!(ctx.autochecks_file("term-01").exists());
    assert_eq!(ctx.engine.autochecks().read("term-01")?.len(), 3);
    assert_eq!(ctx.engine.autochecks().read("db-01")?.len(), 1);

    let summary = ctx.scheduler.run_cycle(CycleKind::Check).await?;
    assert_eq!(summary.completed, 2);

    let results = ctx.engine.results();
    let term = results
        .get("term-01", &sessions_id())
        .expect("sessions result of term-01");
    assert_eq!(term.state, State::Warn);
    assert_eq!(term.summary, "18 Active(!), 2 Inactive");
    assert_eq!(term.metric("active").map(|m| m.value), Some(18.0));

    let db = results
        .get("db-01", &sessions_id())
        .expect("sessions result of db-01");
    assert_eq!(db.state, State::Ok);
    assert_eq!(db.summary, "90 Active, 10 Inactive");

    let drive = results
        .get("term-01", &drive_id("tsmfarm3 / LIBRARY3 / DRIVE01"))
        .expect("drive result");
    assert_eq!(drive.state, State::Ok);
    assert_eq!(drive.summary, "[000782XXXX] state: LOADED, online: YES");

    let broken = results
        .get("term-01", &drive_id("GPFSFILE / GPFSFILE1"))
        .expect("drive result");
    assert_eq!(broken.state, State::Crit);
    Ok(())
}

#[tokio::test]
async fn rediscovery_leaves_autochecks_untouched() -> Result<()> {
    let ctx = build_test_context()?;
    ctx.write_spool("term-01", &format!("{}{TSM_OUTPUT}", sessions_output(20, 18, 2)))?;

    ctx.scheduler
        .run_cycle(CycleKind::Discovery(DiscoveryMode::New))
        .await?;
    let before = std::fs::read(ctx.autochecks_file("term-01"))?;

    let raw = read_spool(&ctx.spool_dir(), "term-01")?;
    let report = ctx.engine.discover_host("term-01", &raw, DiscoveryMode::FixAll)?;
    assert!(!report.changed);
    assert_eq!(report.count(Transition::Kept), 3);
    assert_eq!(std::fs::read(ctx.autochecks_file("term-01"))?, before);
    Ok(())
}

#[tokio::test]
async fn vanished_section_keeps_previous_result_until_removed() -> Result<()> {
    let ctx = build_test_context()?;
    ctx.write_spool("term-01", &format!("{}{TSM_OUTPUT}", sessions_output(20, 18, 2)))?;
    ctx.scheduler
        .run_cycle(CycleKind::Discovery(DiscoveryMode::New))
        .await?;
    ctx.scheduler.run_cycle(CycleKind::Check).await?;

    ctx.write_spool("term-01", &sessions_output(20, 5, 15))?;
    let raw = read_spool(&ctx.spool_dir(), "term-01")?;
    let report = ctx.engine.check_host("term-01", &raw, Utc::now())?;
    assert_eq!(report.stale(), 2);

    let drive = report
        .service(&drive_id("tsmfarm3 / LIBRARY3 / DRIVE01"))
        .expect("drive service");
    assert!(drive.evaluation.is_stale());
    assert_eq!(drive.result.as_ref().map(|r| r.state), Some(State::Ok));

    let sessions = report.service(&sessions_id()).expect("sessions service");
    assert_eq!(
        sessions.result.as_ref().map(|r| r.summary.as_str()),
        Some("5 Active, 15 Inactive")
    );

    let report = ctx.engine.discover_host("term-01", &raw, DiscoveryMode::New)?;
    assert_eq!(report.count(Transition::Vanished), 2);
    assert_eq!(report.entries.len(), 3);

    let report = ctx.engine.discover_host("term-01", &raw, DiscoveryMode::Remove)?;
    assert_eq!(report.count(Transition::Removed), 2);
    assert_eq!(ctx.engine.autochecks().read("term-01")?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn hosts_without_autochecks_or_output() -> Result<()> {
    let ctx = build_test_context()?;

    let summary = ctx.scheduler.run_cycle(CycleKind::Check).await?;
    assert_eq!(summary, CycleSummary::default());

    ctx.write_spool("new-01", &sessions_output(3, 2, 1))?;
    let summary = ctx.scheduler.run_cycle(CycleKind::Check).await?;
    assert_eq!(summary.completed, 1);
    assert!(ctx.engine.results().host_results("new-01").is_empty());

    std::fs::remove_dir_all(ctx.spool_dir())?;
    assert!(ctx.scheduler.run_cycle(CycleKind::Check).await.is_err());
    Ok(())
}

#[tokio::test]
async fn invalid_host_names_fail_without_stopping_the_cycle() -> Result<()> {
    let ctx = build_test_context()?;
    ctx.write_spool("db-01", &sessions_output(100, 90, 10))?;
    ctx.write_spool("bad host", &sessions_output(100, 90, 10))?;

    let summary = ctx
        .scheduler
        .run_cycle(CycleKind::Discovery(DiscoveryMode::New))
        .await?;
    assert_eq!(summary.hosts, 2);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(ctx.engine.autochecks().read("db-01")?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn busy_host_is_counted_as_skipped() -> Result<()> {
    let ctx = build_test_context()?;
    ctx.write_spool("term-01", &sessions_output(20, 18, 2))?;
    ctx.write_spool("db-01", &sessions_output(100, 90, 10))?;
    ctx.scheduler
        .run_cycle(CycleKind::Discovery(DiscoveryMode::New))
        .await?;

    let guard = ctx.engine.locks().try_lock("db-01").expect("db-01 is idle");
    let summary = ctx.scheduler.run_cycle(CycleKind::Check).await?;
    assert_eq!(
        summary,
        CycleSummary {
            hosts: 2,
            completed: 1,
            skipped: 1,
            ..CycleSummary::default()
        }
    );
    assert!(ctx.engine.results().get("db-01", &sessions_id()).is_none());
    assert!(ctx.engine.results().get("term-01", &sessions_id()).is_some());

    let summary = ctx
        .scheduler
        .run_cycle(CycleKind::Discovery(DiscoveryMode::FixAll))
        .await?;
    assert_eq!(summary.skipped, 1);

    drop(guard);
    let summary = ctx.scheduler.run_cycle(CycleKind::Check).await?;
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.skipped, 0);
    assert!(ctx.engine.results().get("db-01", &sessions_id()).is_some());
    Ok(())
}
