//! resultsview-poll CLI
//!
//! # Usage
//!
//! ```bash
//! # Poll once and print the index as JSON
//! resultsview-poll --jobs-root /var/lib/jenkins/jobs --once
//!
//! # Poll every 30s until Ctrl-C, only ojdk jobs
//! resultsview-poll --config resultsview.yaml --job-pattern 'ojdk.*' --interval 30
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use resultsview_poll::{ConfigError, JobsPoller, PollReport, PollScheduler, PollerConfig};
use resultsview_storage::{ConcurrentIndex, IndexStats, Run, RunIndex, RunKey};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "resultsview-poll")]
#[command(about = "Index build results from a jobs directory", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Jobs directory (overrides the configuration file)
    #[arg(short, long)]
    jobs_root: Option<PathBuf>,

    /// Only track jobs whose whole name matches this regex
    #[arg(long)]
    job_pattern: Option<String>,

    /// Seconds between polls
    #[arg(short, long)]
    interval: Option<u64>,

    /// Poll once, print the index as JSON and exit
    #[arg(long)]
    once: bool,
}

#[derive(Serialize)]
struct JobSummary {
    name: String,
    runs: usize,
    latest_run: Option<Run>,
}

#[derive(Serialize)]
struct PackageSummary {
    nvr: String,
    runs: usize,
}

#[derive(Serialize)]
struct IndexSummary {
    report: PollReport,
    stats: IndexStats,
    jobs: Vec<JobSummary>,
    packages: Vec<PackageSummary>,
    unfinished_runs: Vec<RunKey>,
}

fn load_config(cli: &Cli) -> anyhow::Result<PollerConfig> {
    let mut config = match (&cli.config, &cli.jobs_root) {
        (Some(path), _) => PollerConfig::from_yaml(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        (None, Some(root)) => PollerConfig::new(root),
        (None, None) => return Err(ConfigError::MissingJobsRoot.into()),
    };

    if let Some(root) = &cli.jobs_root {
        config = config.with_jobs_root(root);
    }
    if let Some(pattern) = &cli.job_pattern {
        config = config.with_job_pattern(pattern)?;
    }
    if let Some(secs) = cli.interval {
        config = config.with_poll_interval(Duration::from_secs(secs))?;
    }
    Ok(config)
}

fn summarize(index: &ConcurrentIndex, report: PollReport) -> IndexSummary {
    let jobs = index
        .jobs()
        .into_iter()
        .map(|job| JobSummary {
            runs: index.job_runs(&job.name).len(),
            latest_run: index.job_latest_run(&job.name),
            name: job.name,
        })
        .collect();

    let packages = index
        .packages()
        .into_iter()
        .map(|package| PackageSummary {
            runs: index.package_run_count(&package.nvr),
            nvr: package.nvr,
        })
        .collect();

    IndexSummary {
        report,
        stats: index.stats(),
        jobs,
        packages,
        unfinished_runs: index.unfinished_runs().iter().map(Run::key).collect(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!("Watching {}", config.jobs_root().display());

    let index = Arc::new(ConcurrentIndex::new());
    let mut poller = JobsPoller::new(config, Arc::clone(&index));

    if cli.once {
        let report = tokio::task::spawn_blocking(move || poller.poll()).await??;
        let summary = summarize(&index, report);
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let scheduler = PollScheduler::new(poller);
    let handle = scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");
    handle.shutdown().await?;

    let stats = index.stats();
    info!(
        "Final index: {} jobs, {} runs, {} packages, {} unfinished",
        stats.jobs, stats.runs, stats.packages, stats.unfinished_runs
    );
    Ok(())
}
