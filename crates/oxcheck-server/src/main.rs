use anyhow::Result;
use chrono::Utc;
use oxcheck_engine::{DiscoveryMode, DiscoveryReport, HostCheckReport};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use oxcheck_server::agent_output::read_spool;
use oxcheck_server::build_engine;
use oxcheck_server::config::ServerConfig;
use oxcheck_server::scheduler::CheckScheduler;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  oxcheck-server [config.toml]                        Start the scheduler");
    eprintln!("  oxcheck-server discover <config.toml> <host> [mode] Run discovery once (mode: new, remove, fix_all)");
    eprintln!("  oxcheck-server check <config.toml> <host>           Run one check cycle and print the results");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("oxcheck=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("discover") => {
            let (config_path, host) = host_args(&args, "discover")?;
            let mode = match args.get(4) {
                Some(mode) => mode.parse::<DiscoveryMode>().map_err(anyhow::Error::msg)?,
                None => DiscoveryMode::default(),
            };
            run_discover(config_path, host, mode)
        }
        Some("check") => {
            let (config_path, host) = host_args(&args, "check")?;
            run_check(config_path, host)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

fn host_args<'a>(args: &'a [String], command: &str) -> Result<(&'a str, &'a str)> {
    let config_path = args.get(2).ok_or_else(|| {
        print_usage();
        anyhow::anyhow!("{command} requires <config.toml> and <host> arguments")
    })?;
    let host = args.get(3).ok_or_else(|| {
        print_usage();
        anyhow::anyhow!("{command} requires <host> argument")
    })?;
    Ok((config_path, host))
}

fn load_config(config_path: &str) -> Result<ServerConfig> {
    let config = ServerConfig::load(config_path)?;
    oxcheck_common::id::init(1, config.node_id);
    Ok(config)
}

fn run_discover(config_path: &str, host: &str, mode: DiscoveryMode) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = build_engine(&config)?;
    let raw = read_spool(std::path::Path::new(&config.spool_dir), host)?;
    let report = engine.discover_host(host, &raw, mode)?;
    print_discovery(&report);
    Ok(())
}

fn run_check(config_path: &str, host: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = build_engine(&config)?;
    let raw = read_spool(std::path::Path::new(&config.spool_dir), host)?;
    let report = engine.check_host(host, &raw, Utc::now())?;
    print_check(&report);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_discovery(report: &DiscoveryReport) {
    for transition in &report.transitions {
        println!("{:<10} {}", format!("{:?}", transition.transition), transition.id);
    }
    for failure in &report.failures {
        println!("{:<10} {}: {}", "FAILED", failure.plugin, failure.error);
    }
    println!(
        "{} services, autochecks {}",
        report.entries.len(),
        if report.changed { "updated" } else { "unchanged" }
    );
}

#[allow(clippy::print_stdout)]
fn print_check(report: &HostCheckReport) {
    for service in &report.services {
        match &service.result {
            Some(result) => {
                let stale = if service.evaluation.is_stale() { " (stale)" } else { "" };
                println!(
                    "{:<8} {:<40} {}{stale}",
                    result.state.to_string(),
                    service.description,
                    result.summary
                );
            }
            None => println!("{:<8} {:<40} (no data)", "PENDING", service.description),
        }
    }
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = load_config(config_path)?;

    tracing::info!(
        data_dir = %config.data_dir,
        spool_dir = %config.spool_dir,
        check_interval = config.check_interval_secs,
        "oxcheck-server starting"
    );

    let engine = Arc::new(build_engine(&config)?);
    let scheduler = CheckScheduler::new(engine, &config);

    tokio::select! {
        _ = scheduler.run() => {}
        _ = signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("oxcheck-server stopped");
    Ok(())
}
