//! A script job registered with the scheduler.
//!
//! Each [`ScheduledScriptJob`] owns one [`ExecutionHost`] for its whole
//! lifetime. On every trigger it resolves the configured `file` attribute,
//! runs the script and mirrors the host's progress notifications into a
//! [`JobStatus`] watch channel and onto the [`EventBus`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use cronscript_core::job_config::{resolve_script_path, ConfigAccessor, JobConfig, ATTR_FILE};
use cronscript_core::job_events::{
    EVENT_JOB_FAILED, EVENT_JOB_FINISHED, EVENT_JOB_PROGRESS, EVENT_JOB_PROGRESS_COMPLETED,
    EVENT_JOB_STARTED,
};
use cronscript_core::progress::ProgressArgs;
use cronscript_core::status::{JobStatus, RunState};
use cronscript_core::types::SourceId;
use cronscript_events::{EventBus, JobEvent};
use cronscript_host::{CategoryLog, ExecutionHost, HostConfig, HostError, ProgressListener, ScriptLog};
use serde_json::json;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;

/// How a triggered run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No script configured; the session was not touched.
    Skipped,
    /// Cancellation was requested before or during the run.
    Cancelled,
    /// The script ran to completion.
    Completed,
}

// ---------------------------------------------------------------------------
// Status publisher
// ---------------------------------------------------------------------------

/// Listens to host notifications and publishes them as job status and events.
struct JobStatusPublisher {
    job_name: String,
    status: watch::Sender<JobStatus>,
    bus: Arc<EventBus>,
}

impl JobStatusPublisher {
    fn new(job_name: String, bus: Arc<EventBus>) -> Self {
        let (status, _) = watch::channel(JobStatus::default());
        Self {
            job_name,
            status,
            bus,
        }
    }

    fn publish(&self, event_type: &str, payload: serde_json::Value) {
        self.bus
            .publish(JobEvent::new(event_type, self.job_name.as_str()).with_payload(payload));
    }

    fn mark_started(&self, script: &Path) {
        self.status.send_modify(|status| {
            status.state = RunState::Running;
            status.last_started_at = Some(Utc::now());
        });
        self.publish(
            EVENT_JOB_STARTED,
            json!({ "script": script.display().to_string() }),
        );
    }

    fn mark_finished(&self, script: &Path, error: Option<String>, cancelled: bool) {
        self.status.send_modify(|status| {
            status.state = RunState::Idle;
            status.last_finished_at = Some(Utc::now());
            status.last_error = error.clone();
        });
        let script = script.display().to_string();
        match error {
            Some(error) if !cancelled => {
                self.publish(EVENT_JOB_FAILED, json!({ "script": script, "error": error }));
            }
            _ => {
                self.publish(
                    EVENT_JOB_FINISHED,
                    json!({ "script": script, "cancelled": cancelled }),
                );
            }
        }
    }
}

impl ProgressListener for JobStatusPublisher {
    fn on_progress(&self, args: &ProgressArgs) {
        self.status.send_modify(|status| status.apply_progress(args));
        self.publish(
            EVENT_JOB_PROGRESS,
            json!({
                "source_id": args.source_id,
                "activity": args.activity,
                "current_operation": args.current_operation,
                "status_description": args.status_description,
                "percent_complete": args.percent_complete,
                "seconds_remaining": args.seconds_remaining,
            }),
        );
    }

    fn on_progress_completed(&self, source_id: SourceId) {
        self.status.send_modify(JobStatus::clear_progress);
        self.publish(
            EVENT_JOB_PROGRESS_COMPLETED,
            json!({ "source_id": source_id }),
        );
    }
}

// ---------------------------------------------------------------------------
// ScheduledScriptJob
// ---------------------------------------------------------------------------

/// A named job running one script per trigger inside a long-lived host.
pub struct ScheduledScriptJob {
    name: String,
    config: Arc<dyn ConfigAccessor>,
    base_dir: PathBuf,
    log: CategoryLog,
    host: ExecutionHost,
    publisher: Arc<JobStatusPublisher>,
    disposed: bool,
}

impl ScheduledScriptJob {
    /// Create a job from its jobs file entry.
    pub fn new(
        config: JobConfig,
        host_config: HostConfig,
        base_dir: impl Into<PathBuf>,
        log: Arc<dyn ScriptLog>,
        bus: Arc<EventBus>,
    ) -> Result<Self, JobError> {
        config.validate()?;
        let name = config.name.clone();
        Self::with_accessor(name, Arc::new(config), host_config, base_dir, log, bus)
    }

    /// Create a job reading its attributes from an arbitrary accessor.
    ///
    /// Opens the execution host immediately; a session that cannot be
    /// initialized fails the job's construction.
    pub fn with_accessor(
        name: impl Into<String>,
        config: Arc<dyn ConfigAccessor>,
        host_config: HostConfig,
        base_dir: impl Into<PathBuf>,
        log: Arc<dyn ScriptLog>,
        bus: Arc<EventBus>,
    ) -> Result<Self, JobError> {
        let name = name.into();
        let host = ExecutionHost::new(name.as_str(), host_config, log.clone())?;
        let publisher = Arc::new(JobStatusPublisher::new(name.clone(), bus));
        host.subscribe(publisher.clone());

        Ok(Self {
            log: CategoryLog::new(log, name.as_str()),
            name,
            config,
            base_dir: base_dir.into(),
            host,
            publisher,
            disposed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Observe the job's live status.
    pub fn status(&self) -> watch::Receiver<JobStatus> {
        self.publisher.status.subscribe()
    }

    /// Execute one triggered run.
    ///
    /// A job with no `file` attribute is a no-op. Script failures are
    /// returned after being recorded in the status and published as
    /// `job.failed`; the job stays usable for the next trigger.
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<RunOutcome, JobError> {
        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }

        let Some(file) = self
            .config
            .attribute(ATTR_FILE)
            .filter(|file| !file.trim().is_empty())
        else {
            tracing::debug!(job = %self.name, "No script configured, skipping run");
            return Ok(RunOutcome::Skipped);
        };

        let path = resolve_script_path(&self.base_dir, file.trim());
        self.log.info(&format!("Run script: {}", path.display()));
        self.publisher.mark_started(&path);

        match self.host.run_script_cancellable(&path, cancel) {
            Ok(()) => {
                self.publisher.mark_finished(&path, None, false);
                Ok(RunOutcome::Completed)
            }
            Err(HostError::Cancelled) => {
                tracing::info!(job = %self.name, "Script run cancelled");
                self.publisher
                    .mark_finished(&path, Some(HostError::Cancelled.to_string()), true);
                Ok(RunOutcome::Cancelled)
            }
            Err(e) => {
                // Script errors were already written through the host's error line.
                if !matches!(e, HostError::ScriptFailed(_)) {
                    self.log.error(&e.to_string());
                }
                self.publisher.mark_finished(&path, Some(e.to_string()), false);
                Err(e.into())
            }
        }
    }

    /// Release the execution host. Only the first call has an effect.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.host.dispose();
        tracing::debug!(job = %self.name, "Job disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Drop for ScheduledScriptJob {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ScheduledScriptJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledScriptJob")
            .field("name", &self.name)
            .field("base_dir", &self.base_dir)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use cronscript_host::MemoryLog;

    use super::*;

    fn publisher() -> (JobStatusPublisher, tokio::sync::broadcast::Receiver<JobEvent>) {
        let bus = Arc::new(EventBus::default());
        let rx = bus.subscribe();
        (JobStatusPublisher::new("nightly".into(), bus), rx)
    }

    #[test]
    fn progress_sets_and_completion_clears_fields() {
        let (publisher, mut rx) = publisher();
        let status = publisher.status.subscribe();

        publisher.on_progress(&ProgressArgs {
            source_id: 1,
            activity: "Load".into(),
            current_operation: "file 2".into(),
            status_description: "Reading".into(),
            percent_complete: 40,
            seconds_remaining: 90,
        });
        {
            let current = status.borrow();
            assert_eq!(current.activity.as_deref(), Some("Load"));
            assert_eq!(current.current_operation.as_deref(), Some("file 2"));
            assert_eq!(current.status_description.as_deref(), Some("Reading"));
            assert_eq!(current.progress.as_deref(), Some("40%, 00:01:30 seconds"));
        }

        publisher.on_progress_completed(1);
        assert!(!status.borrow().has_progress());

        let first = rx.try_recv().expect("progress event");
        assert_eq!(first.event_type, EVENT_JOB_PROGRESS);
        assert_eq!(first.payload["percent_complete"], 40);
        let second = rx.try_recv().expect("completed event");
        assert_eq!(second.event_type, EVENT_JOB_PROGRESS_COMPLETED);
        assert_eq!(second.job_name, "nightly");
    }

    #[test]
    fn failed_run_records_error() {
        let (publisher, mut rx) = publisher();
        let path = Path::new("/jobs/a.rhai");

        publisher.mark_started(path);
        assert_eq!(publisher.status.borrow().state, RunState::Running);
        publisher.mark_finished(path, Some("boom".into()), false);

        let status = publisher.status.borrow().clone();
        assert_eq!(status.state, RunState::Idle);
        assert_eq!(status.last_error.as_deref(), Some("boom"));
        assert!(status.last_started_at.is_some());
        assert!(status.last_finished_at.is_some());

        assert_eq!(rx.try_recv().expect("started").event_type, EVENT_JOB_STARTED);
        let failed = rx.try_recv().expect("failed");
        assert_eq!(failed.event_type, EVENT_JOB_FAILED);
        assert_eq!(failed.payload["error"], "boom");
    }

    #[test]
    fn cancelled_run_publishes_finished() {
        let (publisher, mut rx) = publisher();
        publisher.mark_finished(Path::new("a.rhai"), Some("cancelled".into()), true);

        let event = rx.try_recv().expect("finished");
        assert_eq!(event.event_type, EVENT_JOB_FINISHED);
        assert_eq!(event.payload["cancelled"], true);
    }

    #[test]
    fn invalid_job_name_is_rejected() {
        let result = ScheduledScriptJob::new(
            JobConfig::new("bad name!"),
            HostConfig::default(),
            ".",
            Arc::new(MemoryLog::new()),
            Arc::new(EventBus::default()),
        );
        assert!(matches!(result, Err(JobError::Core(_))));
    }
}
