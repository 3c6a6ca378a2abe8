/*
 * resultsview-poll - incremental jobs directory poller
 *
 * Keeps a RunIndex in sync with a build server's jobs directory:
 * - Job set reconciliation (jobs root mtime watermark)
 * - Run discovery per job (builds/ mtime watermark)
 * - Reassessment of unfinished runs (build.xml mtime watermark)
 * - Package identity extraction from build.xml
 * - Periodic scheduling on a tokio runtime
 */

pub mod build_xml;
pub mod config;
pub mod error;
pub mod layout;
pub mod poller;
pub mod scheduler;

// Re-exports
pub use build_xml::{parse_build_xml, read_build_xml, BuildRecord};
pub use config::{ConfigError, PollerConfig, DEFAULT_POLL_INTERVAL};
pub use error::{ErrorCategory, PollError, Result};
pub use layout::JobsLayout;
pub use poller::{JobsPoller, PollReport};
pub use scheduler::{PollScheduler, SchedulerHandle};
