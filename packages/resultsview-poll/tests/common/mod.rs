//! Shared fixtures: a fake jobs directory and a write-counting index.

#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use resultsview_poll::{JobsPoller, PollerConfig};
use resultsview_storage::{
    ConcurrentIndex, IndexStats, Job, Package, Run, RunIndex, RunKey, Result as StorageResult,
};
use tempfile::TempDir;

/// Jobs directory whose mtimes are set explicitly. Every touch moves the
/// clock forward one second, starting well in the future, so changes made
/// through this type are always newer than anything polled before.
pub struct FakeJobs {
    dir: TempDir,
    clock: SystemTime,
}

impl FakeJobs {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            clock: SystemTime::now() + Duration::from_secs(24 * 3600),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn job_dir(&self, job: &str) -> PathBuf {
        self.root().join(job)
    }

    pub fn builds_dir(&self, job: &str) -> PathBuf {
        self.job_dir(job).join("builds")
    }

    pub fn build_xml(&self, job: &str, id: &str) -> PathBuf {
        self.builds_dir(job).join(id).join("build.xml")
    }

    pub fn touch(&mut self, path: &Path) {
        self.clock += Duration::from_secs(1);
        File::open(path).unwrap().set_modified(self.clock).unwrap();
    }

    pub fn add_job(&mut self, job: &str) {
        fs::create_dir_all(self.job_dir(job)).unwrap();
        fs::write(self.job_dir(job).join("config.xml"), "<project/>").unwrap();
        let root = self.root().to_path_buf();
        self.touch(&root);
    }

    /// Job directory without `config.xml`
    pub fn add_bare_dir(&mut self, name: &str) {
        fs::create_dir_all(self.job_dir(name)).unwrap();
        let root = self.root().to_path_buf();
        self.touch(&root);
    }

    /// Writes `config.xml` into an existing directory. Only that directory's
    /// mtime moves; the jobs root is left alone, as on a real filesystem.
    pub fn add_config(&mut self, job: &str) {
        fs::write(self.job_dir(job).join("config.xml"), "<project/>").unwrap();
        let dir = self.job_dir(job);
        self.touch(&dir);
    }

    /// Bump the jobs root mtime, as any entry added or removed there would.
    pub fn touch_root(&mut self) {
        let root = self.root().to_path_buf();
        self.touch(&root);
    }

    /// New run directory, with a status file if `status_xml` is given.
    pub fn add_run(&mut self, job: &str, id: &str, status_xml: Option<&str>) {
        let run_dir = self.builds_dir(job).join(id);
        fs::create_dir_all(&run_dir).unwrap();
        if let Some(xml) = status_xml {
            self.write_status(job, id, xml);
        }
        let builds = self.builds_dir(job);
        self.touch(&builds);
    }

    pub fn write_status(&mut self, job: &str, id: &str, xml: &str) {
        let path = self.build_xml(job, id);
        fs::write(&path, xml).unwrap();
        self.touch(&path);
    }

    pub fn remove_job(&mut self, job: &str) {
        fs::remove_dir_all(self.job_dir(job)).unwrap();
        let root = self.root().to_path_buf();
        self.touch(&root);
    }

    pub fn config(&self) -> PollerConfig {
        PollerConfig::new(self.root())
    }

    pub fn poller(&self) -> JobsPoller<ConcurrentIndex> {
        JobsPoller::new(self.config(), Arc::new(ConcurrentIndex::new()))
    }

    /// Tree used by most scenarios:
    ///
    /// - job1: no runs
    /// - job2: run 1 without result
    /// - job3: run 1 pkg-1-1 SUCCESS, run 2 pkg-1-2 FAILURE
    /// - job4: run 1 pkg-1-2 SUCCESS, run 2 pkg-1-3 FAILURE, run 3 without
    ///   package or result
    pub fn standard() -> Self {
        let mut jobs = Self::new();
        for job in ["job1", "job2", "job3", "job4"] {
            jobs.add_job(job);
        }
        jobs.add_run("job2", "1", Some(&build_xml(None, None)));
        jobs.add_run("job3", "1", Some(&build_xml(Some(("pkg", "1", "1")), Some("SUCCESS"))));
        jobs.add_run("job3", "2", Some(&build_xml(Some(("pkg", "1", "2")), Some("FAILURE"))));
        jobs.add_run("job4", "1", Some(&build_xml(Some(("pkg", "1", "2")), Some("SUCCESS"))));
        jobs.add_run("job4", "2", Some(&build_xml(Some(("pkg", "1", "3")), Some("FAILURE"))));
        jobs.add_run("job4", "3", Some(&build_xml(None, None)));
        jobs
    }
}

/// Status file as written by the build server.
pub fn build_xml(nvr: Option<(&str, &str, &str)>, result: Option<&str>) -> String {
    let package = nvr
        .map(|(name, version, release)| {
            format!(
                "<hudson.plugins.scm.koji.KojiRevisionState plugin=\"jenkins-scm-koji-plugin@2.2\">\
                 <build><name>{name}</name><version>{version}</version><release>{release}</release>\
                 <nvr>{name}-{version}-{release}</nvr></build>\
                 </hudson.plugins.scm.koji.KojiRevisionState>"
            )
        })
        .unwrap_or_default();
    let result = result
        .map(|r| format!("<result>{r}</result>"))
        .unwrap_or_default();
    format!(
        "<?xml version='1.1' encoding='UTF-8'?>\n\
         <build>\n  <actions>{package}</actions>\n  <timestamp>1700000000000</timestamp>\n  {result}\n</build>\n"
    )
}

pub fn run_ids(runs: &[Run]) -> Vec<String> {
    runs.iter().map(|r| r.id.clone()).collect()
}

/// Index wrapper counting every write call.
#[derive(Default)]
pub struct CountingIndex {
    inner: ConcurrentIndex,
    writes: AtomicUsize,
}

impl CountingIndex {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.writes.store(0, Ordering::SeqCst);
    }

    fn count(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl RunIndex for CountingIndex {
    fn job(&self, name: &str) -> Option<Job> {
        self.inner.job(name)
    }

    fn package(&self, nvr: &str) -> Option<Package> {
        self.inner.package(nvr)
    }

    fn run(&self, key: &RunKey) -> Option<Run> {
        self.inner.run(key)
    }

    fn jobs(&self) -> Vec<Job> {
        self.inner.jobs()
    }

    fn packages(&self) -> Vec<Package> {
        self.inner.packages()
    }

    fn job_runs(&self, job: &str) -> Vec<Run> {
        self.inner.job_runs(job)
    }

    fn package_runs(&self, nvr: &str) -> Vec<Run> {
        self.inner.package_runs(nvr)
    }

    fn package_run_count(&self, nvr: &str) -> usize {
        self.inner.package_run_count(nvr)
    }

    fn job_latest_run(&self, job: &str) -> Option<Run> {
        self.inner.job_latest_run(job)
    }

    fn unfinished_runs(&self) -> Vec<Run> {
        self.inner.unfinished_runs()
    }

    fn stats(&self) -> IndexStats {
        self.inner.stats()
    }

    fn store_job(&self, job: Job) {
        self.count();
        self.inner.store_job(job)
    }

    fn update_job(&self, job: Job) -> StorageResult<()> {
        self.count();
        self.inner.update_job(job)
    }

    fn remove_job(&self, name: &str) -> Option<Job> {
        self.count();
        self.inner.remove_job(name)
    }

    fn store_package(&self, package: Package) {
        self.count();
        self.inner.store_package(package)
    }

    fn store_run(&self, run: Run) {
        self.count();
        self.inner.store_run(run)
    }

    fn update_run(&self, run: Run) -> StorageResult<()> {
        self.count();
        self.inner.update_run(run)
    }

    fn add_package_run(&self, nvr: &str, run: &RunKey) {
        self.count();
        self.inner.add_package_run(nvr, run)
    }

    fn remove_package_run(&self, nvr: &str, run: &RunKey) {
        self.count();
        self.inner.remove_package_run(nvr, run)
    }

    fn set_job_latest_run(&self, job: &str, run: &RunKey) {
        self.count();
        self.inner.set_job_latest_run(job, run)
    }

    fn add_unfinished_run(&self, run: &RunKey) {
        self.count();
        self.inner.add_unfinished_run(run)
    }

    fn remove_unfinished_run(&self, run: &RunKey) {
        self.count();
        self.inner.remove_unfinished_run(run)
    }
}
