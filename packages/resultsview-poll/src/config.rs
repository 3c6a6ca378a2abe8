//! Poller configuration
//!
//! Loaded from a versioned YAML file:
//!
//! ```yaml
//! version: 1
//! jobs_root: /var/lib/jenkins/jobs
//! job_pattern: "ojdk.*"
//! poll_interval_secs: 60
//! ```
//!
//! `job_pattern` must match the whole job name. Command-line flags are
//! applied on top with the `with_*` builder methods.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Unsupported version
    #[error("Unsupported configuration version {found}. Supported versions: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    #[error("Invalid job pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Poll interval must be at least one second, got {0:?}")]
    InvalidInterval(Duration),

    #[error("Missing 'jobs_root'. Set it in the configuration file or pass --jobs-root.")]
    MissingJobsRoot,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// On-disk schema, version 1
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFileV1 {
    version: u32,
    #[serde(default)]
    jobs_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    job_pattern: Option<String>,
    #[serde(default = "default_interval_secs")]
    poll_interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

/// Job-name filter, kept with its source text for round-tripping.
#[derive(Debug, Clone)]
struct JobPattern {
    source: String,
    regex: Regex,
}

impl JobPattern {
    fn compile(pattern: &str) -> ConfigResult<Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| {
            ConfigError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    jobs_root: PathBuf,
    job_pattern: Option<JobPattern>,
    poll_interval: Duration,
}

impl PollerConfig {
    /// Watch every job under `jobs_root`, polling at the default interval.
    pub fn new(jobs_root: impl Into<PathBuf>) -> Self {
        Self {
            jobs_root: jobs_root.into(),
            job_pattern: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Only track jobs whose whole name matches `pattern`.
    pub fn with_job_pattern(mut self, pattern: &str) -> ConfigResult<Self> {
        self.job_pattern = Some(JobPattern::compile(pattern)?);
        Ok(self)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> ConfigResult<Self> {
        if interval < Duration::from_secs(1) {
            return Err(ConfigError::InvalidInterval(interval));
        }
        self.poll_interval = interval;
        Ok(self)
    }

    pub fn with_jobs_root(mut self, jobs_root: impl Into<PathBuf>) -> Self {
        self.jobs_root = jobs_root.into();
        self
    }

    pub fn jobs_root(&self) -> &Path {
        &self.jobs_root
    }

    pub fn job_pattern(&self) -> Option<&str> {
        self.job_pattern.as_ref().map(|p| p.source.as_str())
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// `true` when no pattern is configured or the pattern matches `name`.
    pub fn matches_job(&self, name: &str) -> bool {
        self.job_pattern
            .as_ref()
            .map_or(true, |p| p.regex.is_match(name))
    }

    /// Load from YAML file (v1 schema)
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let file: ConfigFileV1 = serde_yaml::from_str(content)?;

        // Version check
        if file.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: file.version,
                supported: vec![CONFIG_VERSION],
            });
        }

        let jobs_root = file.jobs_root.ok_or(ConfigError::MissingJobsRoot)?;
        let mut config =
            Self::new(jobs_root).with_poll_interval(Duration::from_secs(file.poll_interval_secs))?;
        if let Some(pattern) = file.job_pattern {
            config = config.with_job_pattern(&pattern)?;
        }
        Ok(config)
    }

    /// Export as YAML (v1 schema)
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = ConfigFileV1 {
            version: CONFIG_VERSION,
            jobs_root: Some(self.jobs_root.clone()),
            job_pattern: self.job_pattern().map(str::to_string),
            poll_interval_secs: self.poll_interval.as_secs(),
        };
        Ok(serde_yaml::to_string(&file)?)
    }
}
