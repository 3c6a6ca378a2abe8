//! Incremental jobs poller
//!
//! One `poll()` brings the index up to date with the jobs directory:
//!
//! 1. **Job set**: re-list the root only if its mtime moved past the root
//!    watermark; add new job directories, remove vanished ones.
//! 2. **New runs**: per job, re-list `builds/` only if its mtime moved past
//!    the job's watermark (or the job has no runs yet); append runs with ids
//!    above the latest known run.
//! 3. **Reassessment**: re-read the status file of every unfinished run
//!    whose `build.xml` changed since it was last processed.
//!
//! Status files that cannot be read or parsed never fail a poll.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::io;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use resultsview_storage::{version_compare, Job, Run, RunIndex, RunStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::build_xml::{read_build_xml, BuildRecord};
use crate::config::PollerConfig;
use crate::error::{PollError, Result};
use crate::layout::{is_newer, modified, JobsLayout};

/// What one poll changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollReport {
    /// Jobs root was listed (its mtime moved)
    pub root_rescanned: bool,
    pub jobs_added: usize,
    pub jobs_removed: usize,
    pub runs_discovered: usize,
    /// Unfinished runs checked in the reassessment phase
    pub runs_reassessed: usize,
    /// Runs that reached a terminal status during reassessment
    pub runs_finished: usize,
    pub packages_created: usize,
    pub package_links: usize,
    pub duration_ms: u64,
}

impl PollReport {
    /// `true` if the poll wrote anything to the index.
    pub fn changed(&self) -> bool {
        self.jobs_added > 0
            || self.jobs_removed > 0
            || self.runs_discovered > 0
            || self.runs_finished > 0
            || self.packages_created > 0
            || self.package_links > 0
    }
}

pub struct JobsPoller<I: RunIndex> {
    index: Arc<I>,
    layout: JobsLayout,
    config: PollerConfig,
    root_watermark: Option<SystemTime>,
}

impl<I: RunIndex> JobsPoller<I> {
    pub fn new(config: PollerConfig, index: Arc<I>) -> Self {
        Self {
            layout: JobsLayout::new(config.jobs_root()),
            index,
            config,
            root_watermark: None,
        }
    }

    pub fn index(&self) -> &Arc<I> {
        &self.index
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn layout(&self) -> &JobsLayout {
        &self.layout
    }

    pub fn root_watermark(&self) -> Option<SystemTime> {
        self.root_watermark
    }

    /// Forget the root watermark so the next poll re-lists the jobs root.
    pub fn reset_root_watermark(&mut self) {
        self.root_watermark = None;
    }

    /// Run one poll cycle.
    ///
    /// # Errors
    ///
    /// Fails if the jobs root or a `builds/` directory cannot be listed.
    /// Index writes made before the failure are kept.
    pub fn poll(&mut self) -> Result<PollReport> {
        let started = Instant::now();
        let mut report = PollReport::default();

        self.reconcile_jobs(&mut report)?;
        for job in self.index.jobs() {
            self.discover_runs(job, &mut report)?;
        }
        self.reassess_unfinished(&mut report)?;

        report.duration_ms = started.elapsed().as_millis() as u64;
        let stats = self.index.stats();
        info!(
            "Poll done in {}ms: +{} -{} jobs, {} new runs, {} finished, {} new packages ({} jobs, {} runs, {} unfinished)",
            report.duration_ms,
            report.jobs_added,
            report.jobs_removed,
            report.runs_discovered,
            report.runs_finished,
            report.packages_created,
            stats.jobs,
            stats.runs,
            stats.unfinished_runs
        );
        Ok(report)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Job set
    // ═══════════════════════════════════════════════════════════════════════

    fn reconcile_jobs(&mut self, report: &mut PollReport) -> Result<()> {
        let root = self.layout.root();
        let mtime = modified(root)
            .map_err(|e| PollError::io(root, e))?
            .ok_or_else(|| {
                PollError::io(
                    root,
                    io::Error::new(io::ErrorKind::NotFound, "jobs root does not exist"),
                )
            })?;
        if !is_newer(mtime, self.root_watermark) {
            debug!("Jobs root unchanged, skipping listing");
            return Ok(());
        }

        let listed: HashSet<String> = self
            .layout
            .list_job_names()?
            .into_iter()
            .filter(|name| self.config.matches_job(name))
            .collect();

        for name in &listed {
            if self.index.job(name).is_none() && self.layout.is_job(name) {
                debug!("New job: {}", name);
                self.index.store_job(Job::new(name.as_str()));
                report.jobs_added += 1;
            }
        }

        for job in self.index.jobs() {
            if !listed.contains(&job.name) {
                info!("Job {} disappeared, removing it", job.name);
                self.index.remove_job(&job.name);
                report.jobs_removed += 1;
            }
        }

        self.root_watermark = Some(mtime);
        report.root_rescanned = true;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // New runs
    // ═══════════════════════════════════════════════════════════════════════

    fn discover_runs(&self, mut job: Job, report: &mut PollReport) -> Result<()> {
        let builds = self.layout.builds_dir(&job.name);
        let Some(mtime) = modified(&builds).map_err(|e| PollError::io(&builds, e))? else {
            return Ok(());
        };

        let latest = self.index.job_latest_run(&job.name).map(|run| run.id);
        if latest.is_some() && !is_newer(mtime, job.last_runs_scan) {
            return Ok(());
        }

        for id in self.layout.list_run_ids(&job.name)? {
            let is_new = latest
                .as_deref()
                .map_or(true, |latest| version_compare(&id, latest) == Ordering::Greater);
            if !is_new {
                continue;
            }

            let mut run = Run::new(job.name.as_str(), id)?;
            let refresh = self.evaluate(&mut run, report);
            let key = run.key();
            let unfinished = !run.is_finished();
            let link = refresh.relinked.then(|| run.package.clone()).flatten();
            debug!("New run {} ({})", key, run.status);

            self.index.store_run(run);
            if let Some(nvr) = link {
                self.index.add_package_run(&nvr, &key);
            }
            self.index.set_job_latest_run(&job.name, &key);
            if unfinished {
                self.index.add_unfinished_run(&key);
            }
            report.runs_discovered += 1;
        }

        if job.last_runs_scan != Some(mtime) {
            job.last_runs_scan = Some(mtime);
            self.index.update_job(job)?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Reassessment
    // ═══════════════════════════════════════════════════════════════════════

    fn reassess_unfinished(&self, report: &mut PollReport) -> Result<()> {
        for mut run in self.index.unfinished_runs() {
            report.runs_reassessed += 1;
            let refresh = self.evaluate(&mut run, report);
            if !refresh.changed {
                continue;
            }

            let key = run.key();
            let finished = run.is_finished();
            let link = refresh.relinked.then(|| run.package.clone()).flatten();
            if finished {
                debug!("Run {} finished: {}", key, run.status);
            }
            self.index.update_run(run)?;
            if let Some(nvr) = link {
                self.index.add_package_run(&nvr, &key);
            }
            if finished {
                self.index.remove_unfinished_run(&key);
                report.runs_finished += 1;
            }
        }
        Ok(())
    }

    /// Refresh a run from its status file.
    fn evaluate(&self, run: &mut Run, report: &mut PollReport) -> Refresh {
        let path = self.layout.build_xml(&run.job, &run.id);
        let mtime = match modified(&path) {
            Ok(Some(mtime)) => mtime,
            Ok(None) => return Refresh::status(mark_running(run)),
            Err(e) => {
                debug!("Cannot stat {}: {}", path.display(), e);
                return Refresh::status(mark_running(run));
            }
        };
        if !is_newer(mtime, run.last_processed) {
            return Refresh::default();
        }
        run.last_processed = Some(mtime);

        match read_build_xml(&path) {
            Ok(record) => Refresh {
                changed: true,
                relinked: self.apply(run, &record, report),
            },
            Err(e) => {
                debug!("Cannot read status of {}/{}: {}", run.job, run.id, e);
                mark_running(run);
                Refresh::status(true)
            }
        }
    }

    /// Copy status, details and package from a parsed status file. A run
    /// moving to another package is unlinked from the old one here; the new
    /// link is left to the caller. Returns `true` if the package changed.
    fn apply(&self, run: &mut Run, record: &BuildRecord, report: &mut PollReport) -> bool {
        run.status = record.status();
        run.details = record.details();

        let Some(package) = record.package() else {
            return false;
        };
        let nvr = package.nvr.clone();
        if run.package.as_deref() == Some(nvr.as_str()) {
            return false;
        }
        if self.index.package(&nvr).is_none() {
            debug!("New package {}", nvr);
            self.index.store_package(package);
            report.packages_created += 1;
        }
        if let Some(old) = run.package.take() {
            debug!("Run {} moved from {} to {}", run.key(), old, nvr);
            self.index.remove_package_run(&old, &run.key());
        }
        report.package_links += 1;
        run.package = Some(nvr);
        true
    }
}

/// Outcome of re-reading one status file
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Refresh {
    /// The run must be written back
    changed: bool,
    /// `run.package` now names a package the run is not linked to yet
    relinked: bool,
}

impl Refresh {
    fn status(changed: bool) -> Self {
        Self {
            changed,
            relinked: false,
        }
    }
}

fn mark_running(run: &mut Run) -> bool {
    if run.status == RunStatus::Unknown {
        run.status = RunStatus::Running;
        true
    } else {
        false
    }
}
