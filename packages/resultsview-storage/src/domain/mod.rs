//! Domain layer for the results index
//!
//! # Domain Models
//!
//! - `Job`: a build pipeline, one directory under the jobs root
//! - `Run`: one build of a job, keyed by `(job, numeric id)`
//! - `RunStatus`: what is known about a run's outcome
//! - `Package`: name-version-release identity revealed by a run
//!
//! # Port Trait
//!
//! - `RunIndex`: read/write contract between the poller and its readers
//!
//! # Examples
//!
//! ```rust
//! use resultsview_storage::{ConcurrentIndex, Job, Run, RunIndex, RunStatus};
//!
//! let index = ConcurrentIndex::new();
//! index.store_job(Job::new("jdk17-tier1"));
//!
//! let mut run = Run::new("jdk17-tier1", "12").unwrap();
//! run.status = RunStatus::Running;
//! let key = run.key();
//! index.store_run(run);
//! index.set_job_latest_run("jdk17-tier1", &key);
//! index.add_unfinished_run(&key);
//!
//! assert_eq!(index.job_runs("jdk17-tier1").len(), 1);
//! assert_eq!(index.unfinished_runs()[0].id, "12");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::SystemTime;

use crate::version::version_compare;
use crate::{Result, StorageError};

// ═══════════════════════════════════════════════════════════════════════════
// Domain Models
// ═══════════════════════════════════════════════════════════════════════════

/// Build pipeline, identified by its directory name.
///
/// `last_runs_scan` is the modification time of the job's `builds/`
/// directory when it was last listed; `None` means it was never listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    #[serde(default)]
    pub last_runs_scan: Option<SystemTime>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_runs_scan: None,
        }
    }
}

/// Identity of a run: owning job name plus build id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunKey {
    pub job: String,
    pub id: String,
}

impl RunKey {
    pub fn new(job: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.job, self.id)
    }
}

impl PartialOrd for RunKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RunKey {
    fn cmp(&self, other: &Self) -> Ordering {
        version_compare(&self.job, &other.job)
            .then_with(|| version_compare(&self.id, &other.id))
            .then_with(|| (&self.job, &self.id).cmp(&(&other.job, &other.id)))
    }
}

/// Run status, ordered by how much is known rather than by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Never evaluated
    #[default]
    Unknown,
    /// Build still in progress, or the result could not be read yet
    Running,
    /// Terminal, outcome not reported
    Finished,
    Success,
    Unstable,
    Failure,
    Aborted,
    NotBuilt,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Unknown => "UNKNOWN",
            RunStatus::Running => "RUNNING",
            RunStatus::Finished => "FINISHED",
            RunStatus::Success => "SUCCESS",
            RunStatus::Unstable => "UNSTABLE",
            RunStatus::Failure => "FAILURE",
            RunStatus::Aborted => "ABORTED",
            RunStatus::NotBuilt => "NOT_BUILT",
        }
    }

    /// Map the `<result>` text of a status file. Unrecognized or missing
    /// results mean the build has not finished.
    pub fn from_result(result: Option<&str>) -> Self {
        let Some(result) = result else {
            return RunStatus::Running;
        };
        match result.to_ascii_uppercase().as_str() {
            "SUCCESS" => RunStatus::Success,
            "UNSTABLE" => RunStatus::Unstable,
            "FAILURE" => RunStatus::Failure,
            "ABORTED" => RunStatus::Aborted,
            "NOT_BUILT" => RunStatus::NotBuilt,
            _ => RunStatus::Running,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Unknown | RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional build facts captured from the status file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDetails {
    pub timestamp: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    /// Build duration in milliseconds
    pub duration_ms: Option<u64>,
    pub built_on: Option<String>,
}

/// One build of a job.
///
/// Only `status`, `last_processed`, `details` and `package` change after
/// creation, and only through `RunIndex::update_run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub job: String,
    pub id: String,
    pub status: RunStatus,
    /// Modification time of `build.xml` when it was last evaluated
    #[serde(default)]
    pub last_processed: Option<SystemTime>,
    #[serde(default)]
    pub details: RunDetails,
    /// NVR of the package this run built or tested
    #[serde(default)]
    pub package: Option<String>,
}

impl Run {
    /// Create a run in `Unknown` state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidRunId` unless `id` is all ASCII digits.
    pub fn new(job: impl Into<String>, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if !is_run_id(&id) {
            return Err(StorageError::invalid_run_id(id));
        }
        Ok(Self {
            job: job.into(),
            id,
            status: RunStatus::Unknown,
            last_processed: None,
            details: RunDetails::default(),
            package: None,
        })
    }

    pub fn key(&self) -> RunKey {
        RunKey::new(self.job.clone(), self.id.clone())
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}

/// `true` for names matching `[0-9]+`.
pub fn is_run_id(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

/// Software package identity (`name-version-release`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    /// `name-version-release`, the package key
    pub nvr: String,
    pub name: String,
    pub version: String,
    pub release: String,
}

impl Package {
    /// # Errors
    ///
    /// Returns `StorageError::InvalidPackage` if any component is blank.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        release: impl Into<String>,
    ) -> Result<Self> {
        let (name, version, release) = (name.into(), version.into(), release.into());
        for (field, value) in [("name", &name), ("version", &version), ("release", &release)] {
            if value.trim().is_empty() {
                return Err(StorageError::invalid_package(format!(
                    "Package {} is empty",
                    field
                )));
            }
        }
        Ok(Self {
            nvr: format!("{}-{}-{}", name, version, release),
            name,
            version,
            release,
        })
    }
}

/// Entity counts, for logging and status pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub jobs: usize,
    pub runs: usize,
    pub packages: usize,
    pub unfinished_runs: usize,
}

// ═══════════════════════════════════════════════════════════════════════════
// Port Trait: RunIndex
// ═══════════════════════════════════════════════════════════════════════════

/// Queryable index of jobs, runs and packages.
///
/// Readers may call the read half from any thread at any time. The write
/// half is driven by one poller; every write is applied atomically with
/// respect to readers, but a poll cycle as a whole is not.
///
/// All collection reads return owned snapshots sorted by version order.
///
/// # Implementations
///
/// - `ConcurrentIndex`: in-memory, one reader/writer lock
pub trait RunIndex: Send + Sync {
    // ═══════════════════════════════════════════════════════════════════════
    // Reads
    // ═══════════════════════════════════════════════════════════════════════

    fn job(&self, name: &str) -> Option<Job>;

    fn package(&self, nvr: &str) -> Option<Package>;

    fn run(&self, key: &RunKey) -> Option<Run>;

    fn jobs(&self) -> Vec<Job>;

    fn packages(&self) -> Vec<Package>;

    /// Runs of a job; empty for unknown jobs.
    fn job_runs(&self, job: &str) -> Vec<Run>;

    /// Runs associated with a package; empty for unknown packages.
    fn package_runs(&self, nvr: &str) -> Vec<Run>;

    fn package_run_count(&self, nvr: &str) -> usize;

    /// Cached newest run of a job.
    fn job_latest_run(&self, job: &str) -> Option<Run>;

    /// Runs whose outcome is not known yet.
    fn unfinished_runs(&self) -> Vec<Run>;

    fn stats(&self) -> IndexStats;

    // ═══════════════════════════════════════════════════════════════════════
    // Writes
    // ═══════════════════════════════════════════════════════════════════════

    /// Insert or overwrite a job.
    fn store_job(&self, job: Job);

    /// Replace a stored job in place.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::JobNotFound` if the job is not stored.
    fn update_job(&self, job: Job) -> Result<()>;

    /// Remove a job and everything hanging off it: its runs, their package
    /// memberships, their unfinished entries and the latest-run pointer.
    /// Packages themselves stay. Returns the removed job.
    fn remove_job(&self, name: &str) -> Option<Job>;

    /// Insert or overwrite a package.
    fn store_package(&self, package: Package);

    /// Insert or overwrite a run and add it to its job's run set.
    fn store_run(&self, run: Run);

    /// Replace a stored run in place.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::RunNotFound` if the run is not stored.
    fn update_run(&self, run: Run) -> Result<()>;

    /// Associate a run with a package (set semantics).
    fn add_package_run(&self, nvr: &str, run: &RunKey);

    /// Drop a run from a package's run set. The package itself stays.
    fn remove_package_run(&self, nvr: &str, run: &RunKey);

    fn set_job_latest_run(&self, job: &str, run: &RunKey);

    fn add_unfinished_run(&self, run: &RunKey);

    fn remove_unfinished_run(&self, run: &RunKey);
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
