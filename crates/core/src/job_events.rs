//! Event type names published on the event bus for scheduled script jobs.
//!
//! Observers (log forwarders, dashboards) match on these strings, so they
//! are part of the external interface.

/// A job run started executing its script.
pub const EVENT_JOB_STARTED: &str = "job.started";

/// A job run finished without error.
pub const EVENT_JOB_FINISHED: &str = "job.finished";

/// A job run failed (script missing, script error, session closed).
pub const EVENT_JOB_FAILED: &str = "job.failed";

/// A progress record updated the job's live status fields.
pub const EVENT_JOB_PROGRESS: &str = "job.progress";

/// A progress stream completed; the live status fields were cleared.
pub const EVENT_JOB_PROGRESS_COMPLETED: &str = "job.progress_completed";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_are_unique() {
        let names = [
            EVENT_JOB_STARTED,
            EVENT_JOB_FINISHED,
            EVENT_JOB_FAILED,
            EVENT_JOB_PROGRESS,
            EVENT_JOB_PROGRESS_COMPLETED,
        ];
        let mut unique = names.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), names.len(), "all event names must be unique");
    }

    #[test]
    fn event_names_share_job_prefix() {
        for name in [
            EVENT_JOB_STARTED,
            EVENT_JOB_FINISHED,
            EVENT_JOB_FAILED,
            EVENT_JOB_PROGRESS,
            EVENT_JOB_PROGRESS_COMPLETED,
        ] {
            assert!(name.starts_with("job."), "{name} should start with 'job.'");
        }
    }
}
