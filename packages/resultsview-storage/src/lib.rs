//! Results index: jobs, runs and packages discovered in a jobs directory
//!
//! ## Core Principles
//!
//! 1. **Version order**: names and run ids sort with embedded numbers compared
//!    numerically (`job-2` < `job-10`), see [`version_compare`]
//! 2. **Snapshot reads**: every collection read returns an owned, sorted copy
//! 3. **Single writer**: one poller mutates the index, any number of threads
//!    read it concurrently
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use resultsview_storage::{ConcurrentIndex, Job, Package, Run, RunIndex, RunStatus};
//!
//! let index = Arc::new(ConcurrentIndex::new());
//! index.store_job(Job::new("jdk21-tier1"));
//!
//! let package = Package::new("java-21-openjdk", "21.0.1.0.12", "2.el9").unwrap();
//! let mut run = Run::new("jdk21-tier1", "7").unwrap();
//! run.status = RunStatus::Success;
//! run.package = Some(package.nvr.clone());
//!
//! index.add_package_run(&package.nvr, &run.key());
//! index.store_package(package);
//! index.store_run(run);
//!
//! assert_eq!(index.package_run_count("java-21-openjdk-21.0.1.0.12-2.el9"), 1);
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod version;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{
    is_run_id, IndexStats, Job, Package, Run, RunDetails, RunIndex, RunKey, RunStatus,
};
pub use infrastructure::ConcurrentIndex;
pub use version::{version_compare, VersionOrdered};
