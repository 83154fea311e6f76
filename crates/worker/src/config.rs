use std::path::{Path, PathBuf};
use std::time::Duration;

use cronscript_core::error::CoreError;
use cronscript_core::job_config::{JobConfig, JobsFile};
use cronscript_host::HostConfig;

/// Default jobs file, relative to the working directory.
const DEFAULT_JOBS_FILE: &str = "jobs.json";

/// Default time to wait for running scripts on shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Worker process configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub jobs_file: PathBuf,
    /// Base for relative script paths. Falls back to the jobs file's directory.
    pub script_base_dir: Option<PathBuf>,
    pub shutdown_timeout: Duration,
    pub host: HostConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default     |
    /// |-------------------------|-------------|
    /// | `JOBS_FILE`             | `jobs.json` |
    /// | `SCRIPT_BASE_DIR`       | *(jobs file directory)* |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`        |
    ///
    /// Host settings are read by [`HostConfig::from_env`].
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let shutdown_secs: u64 = lookup("SHUTDOWN_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS);

        Self {
            jobs_file: lookup("JOBS_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_JOBS_FILE)),
            script_base_dir: lookup("SCRIPT_BASE_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            shutdown_timeout: Duration::from_secs(shutdown_secs),
            host: HostConfig::from_lookup(&lookup),
        }
    }

    /// Directory relative script paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        if let Some(dir) = &self.script_base_dir {
            return dir.clone();
        }
        match self.jobs_file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Read and validate the jobs file.
    pub fn load_jobs(&self) -> Result<Vec<JobConfig>, CoreError> {
        load_jobs(&self.jobs_file)
    }
}

/// Read and validate the jobs file at `path`.
pub fn load_jobs(path: &Path) -> Result<Vec<JobConfig>, CoreError> {
    let body = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Config(format!("Cannot read jobs file {}: {e}", path.display()))
    })?;
    Ok(JobsFile::parse(&body)?.jobs)
}
