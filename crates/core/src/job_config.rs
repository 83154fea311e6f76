//! Scheduled job configuration: the jobs file format, name validation and
//! script path resolution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Attribute holding the script path of a job.
pub const ATTR_FILE: &str = "file";

/// Default trigger interval when a job does not specify one (1 hour).
pub const DEFAULT_INTERVAL_SECS: u64 = 3600;

/// Maximum length of a job name.
const MAX_NAME_LEN: usize = 128;

/// Read access to a job's configuration attributes.
///
/// Injected into the job instead of being looked up ambiently, so tests and
/// embedders can supply their own source.
pub trait ConfigAccessor: Send + Sync {
    /// Value of the named attribute, or `None` when it is not configured.
    fn attribute(&self, name: &str) -> Option<String>;
}

/// One job entry of the jobs file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    /// Script path; relative paths resolve against the worker's base directory.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Trigger once immediately instead of waiting a full interval.
    #[serde(default)]
    pub run_on_start: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Free-form attributes readable through [`ConfigAccessor`].
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_enabled() -> bool {
    true
}

impl JobConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: None,
            interval_secs: DEFAULT_INTERVAL_SECS,
            run_on_start: false,
            enabled: true,
            attributes: HashMap::new(),
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_interval_secs(mut self, interval_secs: u64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_job_name(&self.name)?;
        if self.interval_secs == 0 {
            return Err(CoreError::Validation(format!(
                "Job '{}' must have an interval of at least one second",
                self.name
            )));
        }
        Ok(())
    }
}

impl ConfigAccessor for JobConfig {
    fn attribute(&self, name: &str) -> Option<String> {
        match name {
            ATTR_FILE => self.file.clone(),
            _ => self.attributes.get(name).cloned(),
        }
    }
}

/// Top-level layout of the jobs file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobsFile {
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl JobsFile {
    /// Parse and validate a jobs file body. Job names must be unique.
    pub fn parse(json: &str) -> Result<Self, CoreError> {
        let file: JobsFile = serde_json::from_str(json)
            .map_err(|e| CoreError::Config(format!("Invalid jobs file: {e}")))?;

        let mut seen = std::collections::HashSet::new();
        for job in &file.jobs {
            job.validate()?;
            if !seen.insert(job.name.as_str()) {
                return Err(CoreError::Validation(format!(
                    "Duplicate job name '{}'",
                    job.name
                )));
            }
        }
        Ok(file)
    }
}

/// Validate a job name.
///
/// Rules:
/// - Must not be empty.
/// - Must not exceed `MAX_NAME_LEN` characters.
/// - Must contain only alphanumeric, hyphen, underscore, or dot characters.
pub fn validate_job_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation(
            "Job name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Job name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(CoreError::Validation(
            "Job name may only contain alphanumeric, hyphen, underscore, or dot characters"
                .to_string(),
        ));
    }
    Ok(())
}

/// Resolve a configured script path against `base_dir` unless it is absolute.
pub fn resolve_script_path(base_dir: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
