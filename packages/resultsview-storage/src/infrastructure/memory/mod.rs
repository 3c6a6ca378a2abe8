//! In-memory RunIndex adapter
//!
//! All maps live behind one `parking_lot::RwLock`: readers share it, each
//! write method takes it exclusively for the duration of that one call and
//! never calls back into another write.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use crate::domain::{IndexStats, Job, Package, Run, RunIndex, RunKey};
use crate::version::VersionOrdered;
use crate::{Result, StorageError};

#[derive(Debug, Default)]
struct IndexState {
    jobs: HashMap<String, Job>,
    job_runs: HashMap<String, HashSet<RunKey>>,
    runs: HashMap<RunKey, Run>,
    packages: HashMap<String, Package>,
    package_runs: HashMap<String, HashSet<RunKey>>,
    latest_runs: HashMap<String, RunKey>,
    unfinished: HashSet<RunKey>,
}

impl IndexState {
    /// Resolve keys to owned runs in version order. Keys without a stored
    /// run are skipped.
    fn resolve_runs<'a>(&self, keys: impl IntoIterator<Item = &'a RunKey>) -> Vec<Run> {
        let mut keys: Vec<&RunKey> = keys.into_iter().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| self.runs.get(key))
            .cloned()
            .collect()
    }
}

/// Thread-safe in-memory index.
///
/// Share it as `Arc<ConcurrentIndex>` between the poller and readers.
#[derive(Debug, Default)]
pub struct ConcurrentIndex {
    state: RwLock<IndexState>,
}

impl ConcurrentIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunIndex for ConcurrentIndex {
    fn job(&self, name: &str) -> Option<Job> {
        self.state.read().jobs.get(name).cloned()
    }

    fn package(&self, nvr: &str) -> Option<Package> {
        self.state.read().packages.get(nvr).cloned()
    }

    fn run(&self, key: &RunKey) -> Option<Run> {
        self.state.read().runs.get(key).cloned()
    }

    fn jobs(&self) -> Vec<Job> {
        let state = self.state.read();
        let mut jobs: Vec<Job> = state.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| VersionOrdered(&a.name).cmp(&VersionOrdered(&b.name)));
        jobs
    }

    fn packages(&self) -> Vec<Package> {
        let state = self.state.read();
        let mut packages: Vec<Package> = state.packages.values().cloned().collect();
        packages.sort_by(|a, b| VersionOrdered(&a.nvr).cmp(&VersionOrdered(&b.nvr)));
        packages
    }

    fn job_runs(&self, job: &str) -> Vec<Run> {
        let state = self.state.read();
        match state.job_runs.get(job) {
            Some(keys) => state.resolve_runs(keys),
            None => Vec::new(),
        }
    }

    fn package_runs(&self, nvr: &str) -> Vec<Run> {
        let state = self.state.read();
        match state.package_runs.get(nvr) {
            Some(keys) => state.resolve_runs(keys),
            None => Vec::new(),
        }
    }

    fn package_run_count(&self, nvr: &str) -> usize {
        self.state
            .read()
            .package_runs
            .get(nvr)
            .map_or(0, HashSet::len)
    }

    fn job_latest_run(&self, job: &str) -> Option<Run> {
        let state = self.state.read();
        state
            .latest_runs
            .get(job)
            .and_then(|key| state.runs.get(key))
            .cloned()
    }

    fn unfinished_runs(&self) -> Vec<Run> {
        let state = self.state.read();
        state.resolve_runs(&state.unfinished)
    }

    fn stats(&self) -> IndexStats {
        let state = self.state.read();
        IndexStats {
            jobs: state.jobs.len(),
            runs: state.runs.len(),
            packages: state.packages.len(),
            unfinished_runs: state.unfinished.len(),
        }
    }

    fn store_job(&self, job: Job) {
        self.state.write().jobs.insert(job.name.clone(), job);
    }

    fn update_job(&self, job: Job) -> Result<()> {
        let mut state = self.state.write();
        match state.jobs.get_mut(&job.name) {
            Some(stored) => {
                *stored = job;
                Ok(())
            }
            None => Err(StorageError::job_not_found(job.name)),
        }
    }

    fn remove_job(&self, name: &str) -> Option<Job> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let removed = state.jobs.remove(name);
        state.latest_runs.remove(name);

        let keys = state.job_runs.remove(name).unwrap_or_default();
        if !keys.is_empty() {
            for key in &keys {
                state.runs.remove(key);
                state.unfinished.remove(key);
            }
            for members in state.package_runs.values_mut() {
                members.retain(|key| !keys.contains(key));
            }
        }
        removed
    }

    fn store_package(&self, package: Package) {
        self.state
            .write()
            .packages
            .insert(package.nvr.clone(), package);
    }

    fn store_run(&self, run: Run) {
        let key = run.key();
        let mut state = self.state.write();
        state
            .job_runs
            .entry(key.job.clone())
            .or_default()
            .insert(key.clone());
        state.runs.insert(key, run);
    }

    fn update_run(&self, run: Run) -> Result<()> {
        let key = run.key();
        let mut state = self.state.write();
        match state.runs.get_mut(&key) {
            Some(stored) => {
                *stored = run;
                Ok(())
            }
            None => Err(StorageError::run_not_found(&key.job, &key.id)),
        }
    }

    fn add_package_run(&self, nvr: &str, run: &RunKey) {
        self.state
            .write()
            .package_runs
            .entry(nvr.to_string())
            .or_default()
            .insert(run.clone());
    }

    fn remove_package_run(&self, nvr: &str, run: &RunKey) {
        if let Some(members) = self.state.write().package_runs.get_mut(nvr) {
            members.remove(run);
        }
    }

    fn set_job_latest_run(&self, job: &str, run: &RunKey) {
        self.state
            .write()
            .latest_runs
            .insert(job.to_string(), run.clone());
    }

    fn add_unfinished_run(&self, run: &RunKey) {
        self.state.write().unfinished.insert(run.clone());
    }

    fn remove_unfinished_run(&self, run: &RunKey) {
        self.state.write().unfinished.remove(run);
    }
}
