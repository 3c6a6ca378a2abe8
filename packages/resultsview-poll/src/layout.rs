//! Jobs directory layout
//!
//! ```text
//! <root>/<job>/config.xml
//! <root>/<job>/builds/<run id>/build.xml
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use resultsview_storage::{is_run_id, VersionOrdered};

use crate::error::{PollError, Result};

pub const JOB_CONFIG: &str = "config.xml";
pub const BUILDS_DIR: &str = "builds";
pub const BUILD_STATUS: &str = "build.xml";

#[derive(Debug, Clone)]
pub struct JobsLayout {
    root: PathBuf,
}

impl JobsLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn job_dir(&self, job: &str) -> PathBuf {
        self.root.join(job)
    }

    pub fn builds_dir(&self, job: &str) -> PathBuf {
        self.job_dir(job).join(BUILDS_DIR)
    }

    pub fn run_dir(&self, job: &str, run_id: &str) -> PathBuf {
        self.builds_dir(job).join(run_id)
    }

    pub fn build_xml(&self, job: &str, run_id: &str) -> PathBuf {
        self.run_dir(job, run_id).join(BUILD_STATUS)
    }

    /// A job is a directory holding `config.xml`.
    pub fn is_job(&self, job: &str) -> bool {
        self.job_dir(job).join(JOB_CONFIG).is_file()
    }

    /// Names of the entries directly under the jobs root.
    pub fn list_job_names(&self) -> Result<Vec<String>> {
        list_names(&self.root).map_err(|e| PollError::io(&self.root, e))
    }

    /// Run directories of a job, in version order.
    ///
    /// A missing `builds/` directory means no runs.
    pub fn list_run_ids(&self, job: &str) -> Result<Vec<String>> {
        let builds = self.builds_dir(job);
        let names = match list_names(&builds) {
            Ok(names) => names,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PollError::io(&builds, e)),
        };

        let mut ids: Vec<String> = names
            .into_iter()
            .filter(|name| is_run_id(name) && builds.join(name).is_dir())
            .collect();
        ids.sort_by(|a, b| VersionOrdered(a).cmp(&VersionOrdered(b)));
        Ok(ids)
    }
}

/// Modification time of `path`, `None` if it does not exist.
pub fn modified(path: &Path) -> io::Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => meta.modified().map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// `true` if `observed` is strictly later than the watermark. An unset
/// watermark is older than any time.
pub fn is_newer(observed: SystemTime, watermark: Option<SystemTime>) -> bool {
    Some(observed) > watermark
}

// Non UTF-8 names cannot be job names or run ids
fn list_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        if let Ok(name) = entry?.file_name().into_string() {
            names.push(name);
        }
    }
    Ok(names)
}
